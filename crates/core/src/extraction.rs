//! Frame extraction window math and frame-to-image conversion.
//!
//! The codec itself sits behind [`FrameExtractor`]; this module decides
//! which window is sampled and turns the chosen frames into new
//! reference images.

use std::path::Path;

use crate::codec::{FrameExtractor, RawFrame};
use crate::error::CoreError;
use crate::media::{ExtractedFrame, PreviewRegistry, ReferenceImage};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default length of the clip window in seconds.
pub const DEFAULT_CLIP_LENGTH_SECS: f64 = 3.0;

/// Spacing between sampled frames in seconds.
pub const SAMPLE_INTERVAL_SECS: f64 = 1.0;

// ---------------------------------------------------------------------------
// Clip window
// ---------------------------------------------------------------------------

/// The bounded time range sampled from a longer video.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipWindow {
    pub start_secs: f64,
    pub length_secs: f64,
}

impl ClipWindow {
    pub fn end_secs(&self) -> f64 {
        self.start_secs + self.length_secs
    }

    /// Timestamps sampled at [`SAMPLE_INTERVAL_SECS`] cadence across
    /// `[start, start + length)`.
    pub fn sample_timestamps(&self) -> Vec<f64> {
        let mut out = Vec::new();
        let mut offset = 0.0;
        while offset < self.length_secs {
            out.push(self.start_secs + offset);
            offset += SAMPLE_INTERVAL_SECS;
        }
        out
    }
}

/// Compute the clip window for a video of `total_secs`.
///
/// The window never runs past the end of the media: the length is capped
/// at the total duration and the start is pulled back so that
/// `start + length <= total`.
pub fn clip_window(
    total_secs: f64,
    start_secs: f64,
    length_secs: f64,
) -> Result<ClipWindow, CoreError> {
    if !total_secs.is_finite() || total_secs <= 0.0 {
        return Err(CoreError::Extraction(format!(
            "media duration must be a positive number, got {total_secs}"
        )));
    }
    if !start_secs.is_finite() || !length_secs.is_finite() || length_secs <= 0.0 {
        return Err(CoreError::Extraction(format!(
            "invalid clip window (start {start_secs}, length {length_secs})"
        )));
    }

    let length = length_secs.min(total_secs);
    let start = start_secs.clamp(0.0, total_secs - length);
    Ok(ClipWindow {
        start_secs: start,
        length_secs: length,
    })
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Sample frames from a clip window of the video at `path`.
///
/// Frames returned by the codec outside the window are dropped and the
/// rest are sorted by timestamp. A codec failure or an empty result is an
/// [`CoreError::Extraction`]; nothing else is touched.
pub async fn extract_frames(
    extractor: &dyn FrameExtractor,
    path: &Path,
    total_secs: f64,
    start_secs: f64,
    length_secs: f64,
    previews: &PreviewRegistry,
) -> Result<Vec<ExtractedFrame>, CoreError> {
    let window = clip_window(total_secs, start_secs, length_secs)?;
    let raw = extractor
        .extract_frames(path, window.start_secs, window.length_secs)
        .await?;

    let mut frames: Vec<RawFrame> = raw
        .into_iter()
        .filter(|f| f.timestamp_secs >= window.start_secs && f.timestamp_secs < window.end_secs())
        .collect();
    if frames.is_empty() {
        return Err(CoreError::Extraction(format!(
            "no frames decoded between {:.1}s and {:.1}s",
            window.start_secs,
            window.end_secs()
        )));
    }
    frames.sort_by(|a, b| a.timestamp_secs.total_cmp(&b.timestamp_secs));

    Ok(frames
        .into_iter()
        .map(|f| ExtractedFrame::new(f.timestamp_secs, f.bytes, &f.mime_type, previews))
        .collect())
}

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

/// Convert extracted frames into new reference images, primary first.
///
/// The remaining frames keep their relative order. Every output image has
/// a fresh identity and preview handle; the input is not modified.
pub fn to_reference_images(
    frames: &[ExtractedFrame],
    primary_index: usize,
    previews: &PreviewRegistry,
) -> Result<Vec<ReferenceImage>, CoreError> {
    let primary = frames.get(primary_index).ok_or_else(|| {
        CoreError::Precondition(format!(
            "primary frame index {primary_index} out of range for {} frames",
            frames.len()
        ))
    })?;

    let rest = frames
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != primary_index)
        .map(|(_, f)| f);

    Ok(std::iter::once(primary)
        .chain(rest)
        .map(|f| f.mint_image(previews))
        .collect())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use assert_matches::assert_matches;
    use async_trait::async_trait;

    use super::*;

    /// Codec fake that yields one frame per second and records its calls.
    #[derive(Default)]
    struct CadenceCodec {
        calls: Mutex<Vec<(f64, f64)>>,
    }

    #[async_trait]
    impl FrameExtractor for CadenceCodec {
        async fn extract_frames(
            &self,
            _path: &Path,
            start_secs: f64,
            length_secs: f64,
        ) -> Result<Vec<RawFrame>, CoreError> {
            self.calls.lock().unwrap().push((start_secs, length_secs));
            let window = ClipWindow {
                start_secs,
                length_secs,
            };
            Ok(window
                .sample_timestamps()
                .into_iter()
                .rev()
                .map(|t| RawFrame {
                    timestamp_secs: t,
                    bytes: vec![t as u8],
                    mime_type: "image/jpeg".to_string(),
                })
                .collect())
        }
    }

    struct FailingCodec;

    #[async_trait]
    impl FrameExtractor for FailingCodec {
        async fn extract_frames(
            &self,
            _: &Path,
            _: f64,
            _: f64,
        ) -> Result<Vec<RawFrame>, CoreError> {
            Err(CoreError::Extraction("decoder crashed".to_string()))
        }
    }

    // -- clip_window --------------------------------------------------------

    #[test]
    fn window_inside_media_is_unchanged() {
        let w = clip_window(20.0, 4.0, 3.0).unwrap();
        assert_eq!(w, ClipWindow { start_secs: 4.0, length_secs: 3.0 });
    }

    #[test]
    fn window_is_pulled_back_from_the_end() {
        let w = clip_window(10.0, 9.0, 3.0).unwrap();
        assert_eq!(w.start_secs, 7.0);
        assert_eq!(w.end_secs(), 10.0);
    }

    #[test]
    fn window_longer_than_media_is_capped() {
        let w = clip_window(2.0, 1.0, 3.0).unwrap();
        assert_eq!(w, ClipWindow { start_secs: 0.0, length_secs: 2.0 });
    }

    #[test]
    fn negative_start_clamps_to_zero() {
        let w = clip_window(10.0, -5.0, 3.0).unwrap();
        assert_eq!(w.start_secs, 0.0);
    }

    #[test]
    fn zero_duration_media_is_an_extraction_error() {
        assert_matches!(clip_window(0.0, 0.0, 3.0), Err(CoreError::Extraction(_)));
    }

    #[test]
    fn three_second_window_samples_three_timestamps() {
        let w = clip_window(30.0, 5.0, DEFAULT_CLIP_LENGTH_SECS).unwrap();
        assert_eq!(w.sample_timestamps(), vec![5.0, 6.0, 7.0]);
    }

    // -- extract_frames -----------------------------------------------------

    #[tokio::test]
    async fn extracts_three_frames_one_second_apart() {
        let codec = CadenceCodec::default();
        let previews = PreviewRegistry::new();
        let frames = extract_frames(&codec, Path::new("a.mp4"), 30.0, 10.0, 3.0, &previews)
            .await
            .unwrap();

        assert_eq!(frames.len(), 3);
        let ts: Vec<f64> = frames.iter().map(|f| f.timestamp_secs).collect();
        assert_eq!(ts, vec![10.0, 11.0, 12.0]);
        assert_eq!(codec.calls.lock().unwrap().as_slice(), &[(10.0, 3.0)]);
    }

    #[tokio::test]
    async fn codec_failure_is_reported_as_extraction_error() {
        let previews = PreviewRegistry::new();
        let result =
            extract_frames(&FailingCodec, Path::new("a.mp4"), 30.0, 0.0, 3.0, &previews).await;
        assert_matches!(result, Err(CoreError::Extraction(_)));
        assert_eq!(previews.live_count(), 0);
    }

    // -- to_reference_images ------------------------------------------------

    fn frames(previews: &PreviewRegistry) -> Vec<ExtractedFrame> {
        (0..3_u8)
            .map(|i| ExtractedFrame::new(f64::from(i), vec![i], "image/jpeg", previews))
            .collect()
    }

    #[test]
    fn primary_frame_comes_first() {
        let previews = PreviewRegistry::new();
        let frames = frames(&previews);
        let images = to_reference_images(&frames, 2, &previews).unwrap();

        assert_eq!(images.len(), frames.len());
        let order: Vec<u8> = images.iter().map(|i| i.bytes()[0]).collect();
        assert_eq!(order, vec![2, 0, 1]);
    }

    #[test]
    fn conversion_mints_fresh_records_and_leaves_frames_alone() {
        let previews = PreviewRegistry::new();
        let frames = frames(&previews);
        let images = to_reference_images(&frames, 0, &previews).unwrap();

        assert_eq!(previews.live_count(), 6);
        for (frame, image) in frames.iter().zip(&images) {
            assert_ne!(frame.preview_url(), image.preview_url());
        }
        assert_eq!(frames[0].timestamp_secs, 0.0);
    }

    #[test]
    fn out_of_range_primary_is_rejected() {
        let previews = PreviewRegistry::new();
        let frames = frames(&previews);
        assert!(to_reference_images(&frames, 3, &previews).is_err());
    }
}
