//! Reference video intake: probe, route, optionally trim, then admit.
//!
//! Runs without borrowing the store so the queue stays editable while the
//! probe and trim collaborators are working. The result is attached with
//! [`crate::store::Studio::attach_video`].

use std::path::PathBuf;

use sceneforge_core::admission::{self, AdmissionDecision, VideoCandidate, VideoTarget};
use sceneforge_core::codec::{MediaProbe, VideoTrimmer};
use sceneforge_core::error::CoreError;
use sceneforge_core::media::{PreviewRegistry, ReferenceVideo};
use sceneforge_core::model_context::{CharacterOrientation, ModelContext};

/// A video handed over by the upload collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoUpload {
    pub path: PathBuf,
    pub mime_type: String,
    pub size_bytes: u64,
}

/// A video that passed admission for a specific model and target.
#[derive(Debug, Clone)]
pub struct AdmittedVideo {
    pub video: ReferenceVideo,
    pub target: VideoTarget,
    /// Catalog key of the model the video was admitted under.
    pub model_key: String,
    /// Whether the video went through the trim flow.
    pub trimmed: bool,
}

/// Probe an upload and admit it, trimming once when it is too long.
///
/// Format and size failures, and videos that are too short, come back as
/// [`CoreError::Validation`]. The trimmed output is probed and validated
/// again before it is admitted.
pub async fn screen_video(
    probe: &dyn MediaProbe,
    trimmer: &dyn VideoTrimmer,
    upload: VideoUpload,
    target: VideoTarget,
    ctx: &ModelContext,
    orientation: CharacterOrientation,
    previews: &PreviewRegistry,
) -> Result<AdmittedVideo, CoreError> {
    let duration_secs = probe.duration_secs(&upload.path).await?;
    let candidate = VideoCandidate {
        path: upload.path,
        mime_type: upload.mime_type,
        size_bytes: upload.size_bytes,
        duration_secs,
    };

    let (candidate, trimmed) = match admission::route(&candidate, ctx, orientation)? {
        AdmissionDecision::Admit => (candidate, false),
        AdmissionDecision::Reject(failure) => {
            tracing::info!(
                path = %candidate.path.display(),
                reason = %failure.reason,
                "Reference video rejected",
            );
            return Err(CoreError::Validation(failure));
        }
        AdmissionDecision::Trim { target_secs } => {
            let request = admission::trim_request(&candidate, target_secs, target);
            tracing::info!(
                path = %request.path.display(),
                duration_secs = candidate.duration_secs,
                target_secs = request.target_secs,
                "Reference video too long, trimming",
            );
            let path = trimmer.trim(&request.path, request.target_secs).await?;
            let size_bytes = tokio::fs::metadata(&path)
                .await
                .map_err(|e| CoreError::Extraction(format!("trimmed file unreadable: {e}")))?
                .len();
            let duration_secs = probe.duration_secs(&path).await?;
            let trimmed = VideoCandidate {
                path,
                mime_type: candidate.mime_type,
                size_bytes,
                duration_secs,
            };
            (trimmed, true)
        }
    };

    let video = admission::admit(candidate, ctx, orientation, previews)?;
    tracing::debug!(video_id = %video.id(), trimmed, "Reference video admitted");
    Ok(AdmittedVideo {
        video,
        target,
        model_key: ctx.key.clone(),
        trimmed,
    })
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Mutex;

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use sceneforge_core::error::ValidationReason;
    use sceneforge_core::model_context::{MODEL_KLING_MOTION_CONTROL, MODEL_KLING_PRO};

    use super::*;

    /// Reports a fixed duration per path; anything else is 12 seconds.
    struct FakeProbe {
        durations: Vec<(PathBuf, f64)>,
    }

    #[async_trait]
    impl MediaProbe for FakeProbe {
        async fn duration_secs(&self, path: &Path) -> Result<f64, CoreError> {
            Ok(self
                .durations
                .iter()
                .find(|(p, _)| p == path)
                .map(|(_, d)| *d)
                .unwrap_or(12.0))
        }
    }

    /// Writes a small file into a temp dir and records the request.
    struct FakeTrimmer {
        dir: tempfile::TempDir,
        calls: Mutex<Vec<f64>>,
    }

    impl FakeTrimmer {
        fn new() -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl VideoTrimmer for FakeTrimmer {
        async fn trim(&self, _path: &Path, target_secs: f64) -> Result<PathBuf, CoreError> {
            self.calls.lock().unwrap().push(target_secs);
            let out = self.dir.path().join("trimmed.mp4");
            std::fs::write(&out, vec![0_u8; 2048]).unwrap();
            Ok(out)
        }
    }

    fn upload(path: &str) -> VideoUpload {
        VideoUpload {
            path: PathBuf::from(path),
            mime_type: "video/mp4".to_string(),
            size_bytes: 4096,
        }
    }

    // -- screen_video -------------------------------------------------------

    #[tokio::test]
    async fn admissible_video_is_admitted_untouched() {
        let ctx = ModelContext::lookup(MODEL_KLING_MOTION_CONTROL).unwrap();
        let previews = PreviewRegistry::new();
        let probe = FakeProbe { durations: vec![] };
        let trimmer = FakeTrimmer::new();

        let admitted = screen_video(
            &probe,
            &trimmer,
            upload("/in/dance.mp4"),
            VideoTarget::Global,
            &ctx,
            CharacterOrientation::Video,
            &previews,
        )
        .await
        .unwrap();

        assert!(!admitted.trimmed);
        assert_eq!(admitted.video.duration_secs(), 12.0);
        assert_eq!(admitted.model_key, MODEL_KLING_MOTION_CONTROL);
        assert!(trimmer.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn long_video_is_trimmed_to_cap_and_revalidated() {
        let ctx = ModelContext::lookup(MODEL_KLING_MOTION_CONTROL).unwrap();
        let previews = PreviewRegistry::new();
        let trimmer = FakeTrimmer::new();
        let trimmed_path = trimmer.dir.path().join("trimmed.mp4");
        let probe = FakeProbe {
            durations: vec![(PathBuf::from("/in/long.mp4"), 45.0), (trimmed_path.clone(), 30.0)],
        };

        let admitted = screen_video(
            &probe,
            &trimmer,
            upload("/in/long.mp4"),
            VideoTarget::Global,
            &ctx,
            CharacterOrientation::Video,
            &previews,
        )
        .await
        .unwrap();

        assert!(admitted.trimmed);
        assert_eq!(*trimmer.calls.lock().unwrap(), vec![30.0]);
        assert_eq!(admitted.video.path(), trimmed_path.as_path());
        assert_eq!(admitted.video.size_bytes(), 2048);
        assert_eq!(admitted.video.duration_secs(), 30.0);
    }

    #[tokio::test]
    async fn too_short_video_is_rejected_without_trim() {
        let ctx = ModelContext::lookup(MODEL_KLING_MOTION_CONTROL).unwrap();
        let previews = PreviewRegistry::new();
        let trimmer = FakeTrimmer::new();
        let probe = FakeProbe {
            durations: vec![(PathBuf::from("/in/short.mp4"), 2.0)],
        };

        let result = screen_video(
            &probe,
            &trimmer,
            upload("/in/short.mp4"),
            VideoTarget::Global,
            &ctx,
            CharacterOrientation::Image,
            &previews,
        )
        .await;

        assert_matches!(
            result,
            Err(CoreError::Validation(f)) if f.reason == ValidationReason::Duration
        );
        assert!(trimmer.calls.lock().unwrap().is_empty());
        assert_eq!(previews.live_count(), 0);
    }

    #[tokio::test]
    async fn wrong_container_is_a_format_failure() {
        let ctx = ModelContext::lookup(MODEL_KLING_MOTION_CONTROL).unwrap();
        let previews = PreviewRegistry::new();
        let mut avi = upload("/in/clip.avi");
        avi.mime_type = "video/x-msvideo".to_string();

        let result = screen_video(
            &FakeProbe { durations: vec![] },
            &FakeTrimmer::new(),
            avi,
            VideoTarget::Global,
            &ctx,
            CharacterOrientation::Video,
            &previews,
        )
        .await;

        assert_matches!(
            result,
            Err(CoreError::Validation(f)) if f.reason == ValidationReason::Format
        );
    }

    #[tokio::test]
    async fn model_without_reference_video_is_unsupported() {
        let ctx = ModelContext::lookup(MODEL_KLING_PRO).unwrap();
        let result = screen_video(
            &FakeProbe { durations: vec![] },
            &FakeTrimmer::new(),
            upload("/in/dance.mp4"),
            VideoTarget::Global,
            &ctx,
            CharacterOrientation::Video,
            &PreviewRegistry::new(),
        )
        .await;
        assert_matches!(result, Err(CoreError::UnsupportedModel(_)));
    }
}
