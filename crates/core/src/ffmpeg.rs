//! FFmpeg/FFprobe backed media collaborators.
//!
//! [`FfmpegFrameExtractor`], [`FfprobeProbe`], and [`FfmpegTrimmer`] shell
//! out to the `ffmpeg`/`ffprobe` binaries on `PATH`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;

use crate::codec::{FrameExtractor, MediaProbe, RawFrame, VideoTrimmer};
use crate::error::{CoreError, ValidationFailure, ValidationReason};
use crate::extraction::ClipWindow;

/// MIME type of the frames written by [`extract_frame_jpeg`].
pub const FRAME_MIME_TYPE: &str = "image/jpeg";

/// Error type for FFmpeg/FFprobe operations.
#[derive(Debug, thiserror::Error)]
pub enum FfmpegError {
    #[error("ffprobe/ffmpeg binary not found: {0}")]
    NotFound(std::io::Error),

    #[error("ffprobe/ffmpeg execution failed (exit code {exit_code:?}): {stderr}")]
    ExecutionFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("failed to parse ffprobe output: {0}")]
    ParseError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("video file not found: {0}")]
    VideoNotFound(String),
}

// ---------------------------------------------------------------------------
// ffprobe JSON output structures
// ---------------------------------------------------------------------------

/// Top-level ffprobe JSON output (`-print_format json -show_format -show_streams`).
#[derive(Debug, Deserialize)]
pub struct FfprobeOutput {
    pub streams: Vec<FfprobeStream>,
    pub format: FfprobeFormat,
}

/// A single stream from ffprobe output.
#[derive(Debug, Deserialize)]
pub struct FfprobeStream {
    pub codec_name: Option<String>,
    pub codec_type: Option<String>,
    pub duration: Option<String>,
}

/// Format-level metadata from ffprobe.
#[derive(Debug, Deserialize)]
pub struct FfprobeFormat {
    pub duration: Option<String>,
    pub format_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn ensure_exists(path: &Path) -> Result<(), FfmpegError> {
    if path.exists() {
        Ok(())
    } else {
        Err(FfmpegError::VideoNotFound(path.to_string_lossy().to_string()))
    }
}

async fn run(command: &mut tokio::process::Command) -> Result<Vec<u8>, FfmpegError> {
    let output = command.output().await.map_err(FfmpegError::NotFound)?;
    if !output.status.success() {
        return Err(FfmpegError::ExecutionFailed {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }
    Ok(output.stdout)
}

/// Run `ffprobe` on a video file and return the parsed JSON output.
pub async fn probe_video(path: &Path) -> Result<FfprobeOutput, FfmpegError> {
    ensure_exists(path)?;

    let stdout = run(tokio::process::Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path))
    .await?;

    let stdout = String::from_utf8_lossy(&stdout);
    serde_json::from_str::<FfprobeOutput>(&stdout)
        .map_err(|e| FfmpegError::ParseError(format!("{e}: {stdout}")))
}

/// Extract a single frame as a JPEG at the given timestamp.
pub async fn extract_frame_jpeg(
    video_path: &Path,
    output_path: &Path,
    timestamp_secs: f64,
) -> Result<(), FfmpegError> {
    ensure_exists(video_path)?;

    run(tokio::process::Command::new("ffmpeg")
        .args(["-y", "-ss", &format!("{timestamp_secs:.3}"), "-i"])
        .arg(video_path)
        .args(["-vframes", "1", "-q:v", "2"])
        .arg(output_path))
    .await?;
    Ok(())
}

/// Copy the first `target_secs` of a video into `output_path` without re-encoding.
pub async fn trim_video(
    video_path: &Path,
    output_path: &Path,
    target_secs: f64,
) -> Result<(), FfmpegError> {
    ensure_exists(video_path)?;

    run(tokio::process::Command::new("ffmpeg")
        .args(["-y", "-i"])
        .arg(video_path)
        .args(["-t", &format!("{target_secs:.3}"), "-c", "copy"])
        .arg(output_path))
    .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Parse the media duration in seconds from ffprobe output.
///
/// Prefers the container duration and falls back to the first video stream.
pub fn parse_duration(probe: &FfprobeOutput) -> Option<f64> {
    let from_format = probe
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok());

    from_format.or_else(|| {
        probe
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("video"))
            .and_then(|s| s.duration.as_deref())
            .and_then(|d| d.parse::<f64>().ok())
    })
}

/// File name for a trimmed copy, e.g. `clip.mp4` -> `clip_trim_30s.mp4`.
pub fn trimmed_file_name(path: &Path, target_secs: f64) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "video".to_string());
    match path.extension() {
        Some(ext) => format!("{stem}_trim_{target_secs:.0}s.{}", ext.to_string_lossy()),
        None => format!("{stem}_trim_{target_secs:.0}s"),
    }
}

// ---------------------------------------------------------------------------
// Collaborator implementations
// ---------------------------------------------------------------------------

/// Samples frames by running one `ffmpeg` seek per timestamp.
#[derive(Debug, Default, Clone)]
pub struct FfmpegFrameExtractor;

#[async_trait]
impl FrameExtractor for FfmpegFrameExtractor {
    async fn extract_frames(
        &self,
        path: &Path,
        start_secs: f64,
        length_secs: f64,
    ) -> Result<Vec<RawFrame>, CoreError> {
        let scratch = tempfile::tempdir().map_err(|e| CoreError::Extraction(e.to_string()))?;
        let window = ClipWindow {
            start_secs,
            length_secs,
        };

        let mut frames = Vec::new();
        for (index, timestamp) in window.sample_timestamps().into_iter().enumerate() {
            let output = scratch.path().join(format!("frame_{index:03}.jpg"));
            extract_frame_jpeg(path, &output, timestamp)
                .await
                .map_err(|e| CoreError::Extraction(e.to_string()))?;
            let bytes = tokio::fs::read(&output)
                .await
                .map_err(|e| CoreError::Extraction(e.to_string()))?;
            frames.push(RawFrame {
                timestamp_secs: timestamp,
                bytes,
                mime_type: FRAME_MIME_TYPE.to_string(),
            });
        }
        Ok(frames)
    }
}

/// Reads durations with `ffprobe`.
#[derive(Debug, Default, Clone)]
pub struct FfprobeProbe;

#[async_trait]
impl MediaProbe for FfprobeProbe {
    async fn duration_secs(&self, path: &Path) -> Result<f64, CoreError> {
        let unreadable = |message: String| {
            CoreError::Validation(ValidationFailure {
                reason: ValidationReason::Format,
                message,
            })
        };
        let probe = probe_video(path)
            .await
            .map_err(|e| unreadable(format!("Could not read media: {e}")))?;
        parse_duration(&probe)
            .ok_or_else(|| unreadable("Media has no readable duration".to_string()))
    }
}

/// Writes trimmed copies next to each other in `output_dir`.
#[derive(Debug, Clone)]
pub struct FfmpegTrimmer {
    output_dir: PathBuf,
}

impl FfmpegTrimmer {
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }
}

#[async_trait]
impl VideoTrimmer for FfmpegTrimmer {
    async fn trim(&self, path: &Path, target_secs: f64) -> Result<PathBuf, CoreError> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| CoreError::Extraction(e.to_string()))?;
        let output = self.output_dir.join(trimmed_file_name(path, target_secs));
        trim_video(path, &output, target_secs)
            .await
            .map_err(|e| CoreError::Extraction(format!("trim failed: {e}")))?;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(format_duration: Option<&str>, stream_duration: Option<&str>) -> FfprobeOutput {
        FfprobeOutput {
            streams: vec![FfprobeStream {
                codec_name: Some("h264".into()),
                codec_type: Some("video".into()),
                duration: stream_duration.map(String::from),
            }],
            format: FfprobeFormat {
                duration: format_duration.map(String::from),
                format_name: Some("mov,mp4,m4a,3gp,3g2,mj2".into()),
            },
        }
    }

    #[test]
    fn test_parse_duration_from_format() {
        let d = parse_duration(&probe(Some("45.2"), Some("44.0"))).unwrap();
        assert!((d - 45.2).abs() < 0.001);
    }

    #[test]
    fn test_parse_duration_from_stream() {
        let d = parse_duration(&probe(None, Some("12.5"))).unwrap();
        assert!((d - 12.5).abs() < 0.001);
    }

    #[test]
    fn test_parse_duration_missing() {
        assert!(parse_duration(&probe(None, None)).is_none());
    }

    #[test]
    fn test_parse_ffprobe_json() {
        let json = r#"{
            "streams": [
                {"index": 0, "codec_name": "h264", "codec_type": "video", "duration": "8.0"}
            ],
            "format": {"duration": "8.04", "format_name": "mov,mp4"}
        }"#;
        let parsed: FfprobeOutput = serde_json::from_str(json).unwrap();
        assert_eq!(parse_duration(&parsed), Some(8.04));
    }

    #[test]
    fn test_trimmed_file_name() {
        assert_eq!(trimmed_file_name(Path::new("/tmp/clip.mp4"), 30.0), "clip_trim_30s.mp4");
        assert_eq!(trimmed_file_name(Path::new("raw"), 10.0), "raw_trim_10s");
    }

    #[tokio::test]
    async fn test_probe_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.mp4");
        let err = probe_video(&missing).await.unwrap_err();
        assert!(matches!(err, FfmpegError::VideoNotFound(_)));
    }

    #[tokio::test]
    async fn test_trimmer_reports_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let trimmer = FfmpegTrimmer::new(dir.path().join("trimmed"));
        let result = trimmer.trim(&dir.path().join("nope.mp4"), 30.0).await;
        assert!(matches!(result, Err(CoreError::Extraction(_))));
    }
}
