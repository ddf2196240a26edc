//! Request shape selection for the motion director.
//!
//! Two shapes exist: the plain image-only pipeline and the motion-control
//! pipeline, which also carries the global reference video together with
//! the orientation and audio flags.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use sceneforge_core::error::CoreError;
use sceneforge_core::model_context::{CharacterOrientation, ModelContext};
use sceneforge_core::style::StylePreset;

/// Maximum number of images the director accepts per request.
pub const MAX_IMAGES_PER_REQUEST: usize = 10;

/// Which director pipeline a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineKind {
    #[serde(rename = "pro-i2v")]
    ImageOnly,
    #[serde(rename = "motion-control")]
    MotionControl,
}

impl PipelineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ImageOnly => "pro-i2v",
            Self::MotionControl => "motion-control",
        }
    }
}

/// Pick the request shape for the active model.
///
/// A global reference video selects motion control, which the model must
/// support. Without one the image-only shape is used, unless the model
/// cannot run without a reference video. Anything else is
/// [`CoreError::UnsupportedModel`].
pub fn select_pipeline(
    ctx: &ModelContext,
    has_global_video: bool,
) -> Result<PipelineKind, CoreError> {
    match (has_global_video, ctx.supports_reference_video, ctx.requires_reference_video) {
        (true, true, _) => Ok(PipelineKind::MotionControl),
        (false, _, false) => Ok(PipelineKind::ImageOnly),
        (true, false, _) => Err(CoreError::UnsupportedModel(format!(
            "{} cannot use a global reference video for auto motion",
            ctx.display_name
        ))),
        (false, _, true) => Err(CoreError::UnsupportedModel(format!(
            "{} needs a global reference video before auto motion can run",
            ctx.display_name
        ))),
    }
}

/// Raw media sent to the director.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaInput {
    pub bytes: Arc<[u8]>,
    pub mime_type: String,
}

/// Extra inputs of the motion-control shape.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionControlInput {
    pub video: MediaInput,
    pub orientation: CharacterOrientation,
    pub keep_original_sound: bool,
}

/// A complete motion director request.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionRequest {
    /// Scene images in queue order.
    pub images: Vec<MediaInput>,
    pub style_preset: StylePreset,
    pub user_note: Option<String>,
    /// Present only for the motion-control shape.
    pub motion_control: Option<MotionControlInput>,
}

impl MotionRequest {
    pub fn pipeline(&self) -> PipelineKind {
        if self.motion_control.is_some() {
            PipelineKind::MotionControl
        } else {
            PipelineKind::ImageOnly
        }
    }

    /// Check the image count bounds before anything is sent.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.images.is_empty() {
            return Err(CoreError::Precondition(
                "At least one scene image is required".to_string(),
            ));
        }
        if self.images.len() > MAX_IMAGES_PER_REQUEST {
            return Err(CoreError::Precondition(format!(
                "Auto motion accepts at most {MAX_IMAGES_PER_REQUEST} images, got {}",
                self.images.len()
            )));
        }
        Ok(())
    }
}

/// A follow-up instruction against a previous director session.
#[derive(Debug, Clone, PartialEq)]
pub struct RefineRequest {
    pub session_id: String,
    pub message: String,
    /// Limit the refinement to one scene.
    pub scene_index: Option<usize>,
}
