//! Per-model structural constraints and the built-in model catalog.
//!
//! A [`ModelContext`] is immutable for the lifetime of a session; every
//! constraint check in the queue, the admission validator, and the
//! auto-motion gate reads from it.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Catalog key of the default image-to-video model.
pub const MODEL_KLING_PRO: &str = "kling-2.6-pro";
/// Catalog key of the motion-control model (requires a reference video).
pub const MODEL_KLING_MOTION_CONTROL: &str = "kling-2.6-motion-control";
/// Catalog key of the six-scene storyboard model with a shared duration budget.
pub const MODEL_STORYBOARD_6: &str = "storyboard-6";

/// All catalog keys.
pub const VALID_MODEL_KEYS: &[&str] = &[
    MODEL_KLING_PRO,
    MODEL_KLING_MOTION_CONTROL,
    MODEL_STORYBOARD_6,
];

/// Reference video byte ceiling for the motion-control model (100 MiB).
const MOTION_CONTROL_MAX_VIDEO_BYTES: u64 = 100 * 1024 * 1024;

/// Container types accepted by the motion-control model.
const MOTION_CONTROL_VIDEO_TYPES: &[&str] = &["video/mp4", "video/quicktime"];

// ---------------------------------------------------------------------------
// Orientation
// ---------------------------------------------------------------------------

/// Whether the generated character follows the image's or the video's framing.
///
/// The orientation selects which duration cap applies to a reference video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CharacterOrientation {
    #[default]
    Image,
    Video,
}

impl CharacterOrientation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "image" => Ok(Self::Image),
            "video" => Ok(Self::Video),
            _ => Err(CoreError::Precondition(format!(
                "Invalid orientation '{s}'. Expected 'image' or 'video'"
            ))),
        }
    }
}

/// Maximum reference video duration per orientation, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrientationDurationCaps {
    pub image_secs: f64,
    pub video_secs: f64,
}

impl OrientationDurationCaps {
    pub fn cap_for(&self, orientation: CharacterOrientation) -> f64 {
        match orientation {
            CharacterOrientation::Image => self.image_secs,
            CharacterOrientation::Video => self.video_secs,
        }
    }
}

// ---------------------------------------------------------------------------
// ModelContext
// ---------------------------------------------------------------------------

/// Immutable configuration of the active generation model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelContext {
    pub key: String,
    pub display_name: String,
    /// Hard cap on the number of scenes in the queue.
    pub max_scenes: usize,
    /// Shared duration budget across all scenes. Soft: surfaced, never enforced.
    pub max_total_duration_secs: Option<f64>,
    pub supports_reference_video: bool,
    /// The model cannot run at all without a global reference video.
    pub requires_reference_video: bool,
    pub orientation_duration_caps: Option<OrientationDurationCaps>,
    pub min_video_duration_secs: f64,
    pub max_video_bytes: u64,
    pub allowed_video_mime_types: Vec<String>,
    pub supports_auto_motion: bool,
    /// Whether the model can keep the reference video's audio track.
    pub supports_audio: bool,
}

impl ModelContext {
    /// Look up a model in the built-in catalog.
    pub fn lookup(key: &str) -> Result<Self, CoreError> {
        match key {
            MODEL_KLING_PRO => Ok(Self::kling_pro()),
            MODEL_KLING_MOTION_CONTROL => Ok(Self::kling_motion_control()),
            MODEL_STORYBOARD_6 => Ok(Self::storyboard_6()),
            _ => Err(CoreError::UnsupportedModel(format!(
                "Unknown model '{key}'. Must be one of: {}",
                VALID_MODEL_KEYS.join(", ")
            ))),
        }
    }

    fn kling_pro() -> Self {
        Self {
            key: MODEL_KLING_PRO.to_string(),
            display_name: "Kling 2.6 Pro".to_string(),
            max_scenes: 10,
            max_total_duration_secs: None,
            supports_reference_video: false,
            requires_reference_video: false,
            orientation_duration_caps: None,
            min_video_duration_secs: 0.0,
            max_video_bytes: 0,
            allowed_video_mime_types: Vec::new(),
            supports_auto_motion: true,
            supports_audio: true,
        }
    }

    fn kling_motion_control() -> Self {
        Self {
            key: MODEL_KLING_MOTION_CONTROL.to_string(),
            display_name: "Kling 2.6 Motion Control".to_string(),
            max_scenes: 10,
            max_total_duration_secs: None,
            supports_reference_video: true,
            requires_reference_video: true,
            orientation_duration_caps: Some(OrientationDurationCaps {
                image_secs: 10.0,
                video_secs: 30.0,
            }),
            min_video_duration_secs: 3.0,
            max_video_bytes: MOTION_CONTROL_MAX_VIDEO_BYTES,
            allowed_video_mime_types: MOTION_CONTROL_VIDEO_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            supports_auto_motion: true,
            supports_audio: true,
        }
    }

    fn storyboard_6() -> Self {
        Self {
            key: MODEL_STORYBOARD_6.to_string(),
            display_name: "Storyboard (6 scenes)".to_string(),
            max_scenes: 6,
            max_total_duration_secs: Some(15.0),
            supports_reference_video: false,
            requires_reference_video: false,
            orientation_duration_caps: None,
            min_video_duration_secs: 0.0,
            max_video_bytes: 0,
            allowed_video_mime_types: Vec::new(),
            supports_auto_motion: false,
            supports_audio: false,
        }
    }

    /// Duration cap for the given orientation, if the model takes reference video.
    pub fn duration_cap(&self, orientation: CharacterOrientation) -> Option<f64> {
        self.orientation_duration_caps
            .map(|caps| caps.cap_for(orientation))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_catalog_key_resolves() {
        for key in VALID_MODEL_KEYS {
            let ctx = ModelContext::lookup(key).unwrap();
            assert_eq!(ctx.key, *key);
            assert!(ctx.max_scenes > 0);
        }
    }

    #[test]
    fn unknown_model_is_unsupported() {
        let err = ModelContext::lookup("sdxl-turbo").unwrap_err();
        assert!(matches!(err, CoreError::UnsupportedModel(_)));
        assert!(err.to_string().contains("sdxl-turbo"));
    }

    #[test]
    fn motion_control_caps_follow_orientation() {
        let ctx = ModelContext::lookup(MODEL_KLING_MOTION_CONTROL).unwrap();
        assert_eq!(ctx.duration_cap(CharacterOrientation::Image), Some(10.0));
        assert_eq!(ctx.duration_cap(CharacterOrientation::Video), Some(30.0));
    }

    #[test]
    fn image_only_model_has_no_duration_cap() {
        let ctx = ModelContext::lookup(MODEL_KLING_PRO).unwrap();
        assert_eq!(ctx.duration_cap(CharacterOrientation::Video), None);
    }

    #[test]
    fn orientation_parse() {
        assert_eq!(CharacterOrientation::parse("image").unwrap(), CharacterOrientation::Image);
        assert_eq!(CharacterOrientation::parse("video").unwrap(), CharacterOrientation::Video);
        assert!(CharacterOrientation::parse("portrait").is_err());
    }
}
