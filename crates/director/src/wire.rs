//! JSON bodies exchanged with the motion director service.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use sceneforge_core::motion::{MotionDirectorResult, MotionItem};

use crate::request::{MediaInput, MotionRequest, PipelineKind, RefineRequest};

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ImageBody {
    pub base64: String,
    pub mime_type: String,
}

impl From<&MediaInput> for ImageBody {
    fn from(input: &MediaInput) -> Self {
        Self {
            base64: STANDARD.encode(&input.bytes),
            mime_type: input.mime_type.clone(),
        }
    }
}

/// Body of `POST /motion/generate`.
#[derive(Debug, Serialize)]
pub struct GenerateBody {
    pub api_key: String,
    pub images: Vec<ImageBody>,
    pub style_preset: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_note: Option<String>,
    pub pipeline_type: PipelineKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_reference_video_base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_reference_video_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character_orientation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_original_sound: Option<bool>,
}

impl GenerateBody {
    pub fn new(api_key: &str, request: &MotionRequest) -> Self {
        let mc = request.motion_control.as_ref();
        Self {
            api_key: api_key.to_string(),
            images: request.images.iter().map(ImageBody::from).collect(),
            style_preset: request.style_preset.as_str().to_string(),
            user_note: request.user_note.clone(),
            pipeline_type: request.pipeline(),
            global_reference_video_base64: mc.map(|m| STANDARD.encode(&m.video.bytes)),
            global_reference_video_mime_type: mc.map(|m| m.video.mime_type.clone()),
            character_orientation: mc.map(|m| m.orientation.as_str().to_string()),
            keep_original_sound: mc.map(|m| m.keep_original_sound),
        }
    }
}

/// Body of `POST /motion/refine`.
#[derive(Debug, Serialize)]
pub struct RefineBody {
    pub api_key: String,
    pub session_id: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene_index: Option<usize>,
}

impl RefineBody {
    pub fn new(api_key: &str, request: &RefineRequest) -> Self {
        Self {
            api_key: api_key.to_string(),
            session_id: request.session_id.clone(),
            message: request.message.clone(),
            scene_index: request.scene_index,
        }
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// One prompt in a generate/refine response.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptBody {
    pub scene_index: usize,
    /// Motion-control sessions answer with `motion_context_prompt`.
    #[serde(default, alias = "motion_context_prompt")]
    pub motion_prompt: String,
    #[serde(default)]
    pub negative_prompt: Option<String>,
    #[serde(default)]
    pub camera_move: Option<String>,
    #[serde(default)]
    pub subject_motion: Option<String>,
    #[serde(default)]
    pub duration_suggestion: Option<String>,
}

/// Response of `POST /motion/generate` and `POST /motion/refine`.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateResponseBody {
    pub session_id: String,
    pub prompts: Vec<PromptBody>,
    #[serde(default)]
    pub recommended_order: Option<Vec<usize>>,
    #[serde(default)]
    pub order_reasoning: Option<String>,
    pub pipeline_type: PipelineKind,
}

/// A decoded director response.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectorResponse {
    /// Director-side session, used for later refinements.
    pub session_id: String,
    pub pipeline: PipelineKind,
    pub result: MotionDirectorResult,
}

impl From<GenerateResponseBody> for DirectorResponse {
    fn from(body: GenerateResponseBody) -> Self {
        let items = body
            .prompts
            .into_iter()
            .map(|p| MotionItem {
                scene_index: p.scene_index,
                motion_prompt: p.motion_prompt,
                negative_prompt: p.negative_prompt,
            })
            .collect();
        Self {
            session_id: body.session_id,
            pipeline: body.pipeline_type,
            result: MotionDirectorResult {
                items,
                recommended_order: body.recommended_order,
                order_reasoning: body.order_reasoning,
            },
        }
    }
}
