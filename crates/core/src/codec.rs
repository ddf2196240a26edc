//! Boundary traits for the media collaborators.
//!
//! The decoding, probing, and trimming implementations are opaque to the
//! rest of the crate. [`crate::ffmpeg`] provides the CLI-backed versions;
//! tests substitute in-memory fakes.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::CoreError;

/// A decoded frame as returned by the codec, before it is given a preview.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    pub timestamp_secs: f64,
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// Samples still frames from a bounded window of a video.
#[async_trait]
pub trait FrameExtractor: Send + Sync {
    async fn extract_frames(
        &self,
        path: &Path,
        start_secs: f64,
        length_secs: f64,
    ) -> Result<Vec<RawFrame>, CoreError>;
}

/// Reads container metadata needed for admission.
#[async_trait]
pub trait MediaProbe: Send + Sync {
    /// Duration of the media at `path` in seconds.
    async fn duration_secs(&self, path: &Path) -> Result<f64, CoreError>;
}

/// Shortens a video to a target duration, producing a new file.
#[async_trait]
pub trait VideoTrimmer: Send + Sync {
    async fn trim(&self, path: &Path, target_secs: f64) -> Result<PathBuf, CoreError>;
}
