//! Reference media records and their preview handles.
//!
//! Every record owns a [`PreviewHandle`] behind an `Arc`. Queue snapshots
//! are cheap clones, so a handle stays alive exactly as long as the last
//! snapshot that references its record and is released on `Drop`.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use uuid::Uuid;

use crate::error::CoreError;
use crate::types::{ImageId, VideoId};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// MIME types accepted for reference images.
pub const ALLOWED_IMAGE_MIME_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp"];

/// URL scheme used for preview handles.
pub const PREVIEW_SCHEME: &str = "preview://";

// ---------------------------------------------------------------------------
// Preview handles
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct RegistryCounters {
    acquired: AtomicU64,
    released: AtomicU64,
}

/// Issues preview handles and keeps count of the ones still alive.
///
/// Cloning the registry shares the counters.
#[derive(Debug, Clone, Default)]
pub struct PreviewRegistry {
    counters: Arc<RegistryCounters>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire a new handle. It is released when the last owner drops it.
    pub fn acquire(&self) -> PreviewHandle {
        self.counters.acquired.fetch_add(1, Ordering::SeqCst);
        PreviewHandle {
            url: format!("{PREVIEW_SCHEME}{}", Uuid::new_v4()),
            counters: Arc::clone(&self.counters),
        }
    }

    /// Number of handles acquired and not yet released.
    pub fn live_count(&self) -> u64 {
        let acquired = self.counters.acquired.load(Ordering::SeqCst);
        let released = self.counters.released.load(Ordering::SeqCst);
        acquired.saturating_sub(released)
    }
}

/// A disposable preview resource backing an image/video thumbnail.
#[derive(Debug)]
pub struct PreviewHandle {
    url: String,
    counters: Arc<RegistryCounters>,
}

impl PreviewHandle {
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.counters.released.fetch_add(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// ReferenceImage
// ---------------------------------------------------------------------------

/// An uploaded or frame-derived image anchoring a scene.
///
/// Immutable once created; replacing an image means minting a new record.
#[derive(Debug, Clone)]
pub struct ReferenceImage {
    id: ImageId,
    bytes: Arc<[u8]>,
    mime_type: String,
    preview: Arc<PreviewHandle>,
}

impl ReferenceImage {
    /// Create an image record from uploaded bytes.
    ///
    /// Rejects empty payloads and MIME types outside
    /// [`ALLOWED_IMAGE_MIME_TYPES`].
    pub fn new(
        bytes: impl Into<Arc<[u8]>>,
        mime_type: &str,
        previews: &PreviewRegistry,
    ) -> Result<Self, CoreError> {
        validate_image_mime_type(mime_type)?;
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(CoreError::Precondition(
                "Reference image must not be empty".to_string(),
            ));
        }
        Ok(Self {
            id: ImageId::new(),
            bytes,
            mime_type: mime_type.to_string(),
            preview: Arc::new(previews.acquire()),
        })
    }

    /// Copy this image under a fresh identity and preview handle.
    ///
    /// Used when media is dragged from one scene to another: the bytes are
    /// shared but the two scenes never alias the same record.
    pub fn duplicate(&self, previews: &PreviewRegistry) -> Self {
        Self {
            id: ImageId::new(),
            bytes: Arc::clone(&self.bytes),
            mime_type: self.mime_type.clone(),
            preview: Arc::new(previews.acquire()),
        }
    }

    pub fn id(&self) -> ImageId {
        self.id
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The payload without copying it.
    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn preview_url(&self) -> &str {
        self.preview.url()
    }
}

/// Validate that a MIME type is an accepted reference image type.
pub fn validate_image_mime_type(mime_type: &str) -> Result<(), CoreError> {
    if ALLOWED_IMAGE_MIME_TYPES.contains(&mime_type) {
        Ok(())
    } else {
        Err(CoreError::Precondition(format!(
            "Unsupported image type '{mime_type}'. Must be one of: {}",
            ALLOWED_IMAGE_MIME_TYPES.join(", ")
        )))
    }
}

// ---------------------------------------------------------------------------
// ReferenceVideo
// ---------------------------------------------------------------------------

/// An admitted reference video.
///
/// Only constructed by [`crate::admission::admit`], so every instance has
/// passed the admission checks for the model it was admitted under.
#[derive(Debug, Clone)]
pub struct ReferenceVideo {
    id: VideoId,
    path: PathBuf,
    mime_type: String,
    size_bytes: u64,
    duration_secs: f64,
    preview: Arc<PreviewHandle>,
}

impl ReferenceVideo {
    pub(crate) fn admitted(
        path: PathBuf,
        mime_type: String,
        size_bytes: u64,
        duration_secs: f64,
        previews: &PreviewRegistry,
    ) -> Self {
        Self {
            id: VideoId::new(),
            path,
            mime_type,
            size_bytes,
            duration_secs,
            preview: Arc::new(previews.acquire()),
        }
    }

    /// Copy this video under a fresh identity and preview handle.
    pub fn duplicate(&self, previews: &PreviewRegistry) -> Self {
        Self {
            id: VideoId::new(),
            path: self.path.clone(),
            mime_type: self.mime_type.clone(),
            size_bytes: self.size_bytes,
            duration_secs: self.duration_secs,
            preview: Arc::new(previews.acquire()),
        }
    }

    pub fn id(&self) -> VideoId {
        self.id
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    pub fn preview_url(&self) -> &str {
        self.preview.url()
    }
}

// ---------------------------------------------------------------------------
// ExtractedFrame
// ---------------------------------------------------------------------------

/// One frame sampled from a clip window.
///
/// Lives only inside a single extraction session.
#[derive(Debug, Clone)]
pub struct ExtractedFrame {
    pub timestamp_secs: f64,
    bytes: Arc<[u8]>,
    mime_type: String,
    preview: Arc<PreviewHandle>,
}

impl ExtractedFrame {
    pub fn new(
        timestamp_secs: f64,
        bytes: impl Into<Arc<[u8]>>,
        mime_type: &str,
        previews: &PreviewRegistry,
    ) -> Self {
        Self {
            timestamp_secs,
            bytes: bytes.into(),
            mime_type: mime_type.to_string(),
            preview: Arc::new(previews.acquire()),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn preview_url(&self) -> &str {
        self.preview.url()
    }

    /// Mint a new reference image carrying this frame's bytes.
    pub(crate) fn mint_image(&self, previews: &PreviewRegistry) -> ReferenceImage {
        ReferenceImage {
            id: ImageId::new(),
            bytes: Arc::clone(&self.bytes),
            mime_type: self.mime_type.clone(),
            preview: Arc::new(previews.acquire()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
