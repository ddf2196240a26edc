//! Reference video admission checks and trim routing.
//!
//! [`validate`] is a pure predicate over a probed candidate. [`route`]
//! turns its verdict into admit / trim / reject, and [`admit`] is the only
//! way to obtain a [`ReferenceVideo`].

use std::path::PathBuf;

use serde::Serialize;

use crate::error::{CoreError, ValidationFailure, ValidationReason};
use crate::media::{PreviewRegistry, ReferenceVideo};
use crate::model_context::{CharacterOrientation, ModelContext};
use crate::types::SceneId;

// ---------------------------------------------------------------------------
// Candidate
// ---------------------------------------------------------------------------

/// A video file that has been uploaded and probed but not yet admitted.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoCandidate {
    pub path: PathBuf,
    pub mime_type: String,
    pub size_bytes: u64,
    /// Duration reported by the probe collaborator.
    pub duration_secs: f64,
}

/// Where an admitted reference video is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "scene_id", rename_all = "snake_case")]
pub enum VideoTarget {
    /// The model-wide global slot.
    Global,
    /// A specific scene.
    Scene(SceneId),
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Run the admission checks in order, stopping at the first failure.
///
/// 1. container type in the model's allow-list (`Format`)
/// 2. byte size within the model's ceiling (`Size`)
/// 3. duration within `[min, cap(orientation)]` (`Duration`)
///
/// Models without orientation caps have no upper duration bound here;
/// [`route`] rejects them before validation is reached.
pub fn validate(
    candidate: &VideoCandidate,
    ctx: &ModelContext,
    orientation: CharacterOrientation,
) -> Result<(), ValidationFailure> {
    if !ctx
        .allowed_video_mime_types
        .iter()
        .any(|t| t == &candidate.mime_type)
    {
        return Err(ValidationFailure {
            reason: ValidationReason::Format,
            message: format!(
                "Unsupported video type '{}'. Must be one of: {}",
                candidate.mime_type,
                ctx.allowed_video_mime_types.join(", ")
            ),
        });
    }

    if candidate.size_bytes > ctx.max_video_bytes {
        return Err(ValidationFailure {
            reason: ValidationReason::Size,
            message: format!(
                "Video is {} bytes, exceeding the {} byte limit",
                candidate.size_bytes, ctx.max_video_bytes
            ),
        });
    }

    let duration = candidate.duration_secs;
    let max = ctx.duration_cap(orientation).unwrap_or(f64::INFINITY);
    if !duration.is_finite() || duration < ctx.min_video_duration_secs || duration > max {
        return Err(ValidationFailure {
            reason: ValidationReason::Duration,
            message: format!(
                "Video is {duration:.1}s; {} orientation requires {:.1}s to {max:.1}s",
                orientation.as_str(),
                ctx.min_video_duration_secs
            ),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

/// What to do with a candidate after validation.
#[derive(Debug, Clone, PartialEq)]
pub enum AdmissionDecision {
    /// Passed every check; wrap it with [`admit`].
    Admit,
    /// Too long: hand it to the trim collaborator, then validate again.
    Trim { target_secs: f64 },
    /// Inadmissible with no remediation.
    Reject(ValidationFailure),
}

/// A request for the trim collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct TrimRequest {
    pub path: PathBuf,
    pub target_secs: f64,
    pub scope: VideoTarget,
}

/// Validate a candidate and decide between admit, trim, and reject.
///
/// Format and size failures are final. A duration failure routes to the
/// trim flow only when the video is longer than the cap; a video that is
/// too short cannot be fixed by trimming.
pub fn route(
    candidate: &VideoCandidate,
    ctx: &ModelContext,
    orientation: CharacterOrientation,
) -> Result<AdmissionDecision, CoreError> {
    ensure_accepts_reference_video(ctx)?;

    let failure = match validate(candidate, ctx, orientation) {
        Ok(()) => return Ok(AdmissionDecision::Admit),
        Err(failure) => failure,
    };

    if failure.reason != ValidationReason::Duration {
        return Ok(AdmissionDecision::Reject(failure));
    }

    match ctx.duration_cap(orientation) {
        Some(max) if candidate.duration_secs.is_finite() && candidate.duration_secs > max => {
            Ok(AdmissionDecision::Trim { target_secs: max })
        }
        _ => Ok(AdmissionDecision::Reject(failure)),
    }
}

/// Build the trim collaborator request for a candidate routed to trimming.
pub fn trim_request(
    candidate: &VideoCandidate,
    target_secs: f64,
    scope: VideoTarget,
) -> TrimRequest {
    TrimRequest {
        path: candidate.path.clone(),
        target_secs,
        scope,
    }
}

/// Wrap a candidate into a [`ReferenceVideo`] if it passes validation.
pub fn admit(
    candidate: VideoCandidate,
    ctx: &ModelContext,
    orientation: CharacterOrientation,
    previews: &PreviewRegistry,
) -> Result<ReferenceVideo, CoreError> {
    ensure_accepts_reference_video(ctx)?;
    validate(&candidate, ctx, orientation).map_err(CoreError::Validation)?;
    Ok(ReferenceVideo::admitted(
        candidate.path,
        candidate.mime_type,
        candidate.size_bytes,
        candidate.duration_secs,
        previews,
    ))
}

fn ensure_accepts_reference_video(ctx: &ModelContext) -> Result<(), CoreError> {
    if ctx.supports_reference_video && ctx.orientation_duration_caps.is_some() {
        Ok(())
    } else {
        Err(CoreError::UnsupportedModel(format!(
            "{} does not accept reference videos",
            ctx.display_name
        )))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::model_context::{
        OrientationDurationCaps, MODEL_KLING_MOTION_CONTROL, MODEL_KLING_PRO,
    };

    fn ctx() -> ModelContext {
        ModelContext::lookup(MODEL_KLING_MOTION_CONTROL).unwrap()
    }

    fn candidate(mime: &str, size: u64, duration: f64) -> VideoCandidate {
        VideoCandidate {
            path: PathBuf::from("/tmp/ref.mp4"),
            mime_type: mime.to_string(),
            size_bytes: size,
            duration_secs: duration,
        }
    }

    // -- validate -----------------------------------------------------------

    #[test]
    fn valid_video_passes() {
        let c = candidate("video/mp4", 1_000, 8.0);
        assert!(validate(&c, &ctx(), CharacterOrientation::Image).is_ok());
    }

    #[test]
    fn format_takes_precedence_over_size_and_duration() {
        let c = candidate("video/x-msvideo", u64::MAX, 999.0);
        let failure = validate(&c, &ctx(), CharacterOrientation::Image).unwrap_err();
        assert_eq!(failure.reason, ValidationReason::Format);
    }

    #[test]
    fn size_takes_precedence_over_duration() {
        let c = candidate("video/mp4", ctx().max_video_bytes + 1, 999.0);
        let failure = validate(&c, &ctx(), CharacterOrientation::Image).unwrap_err();
        assert_eq!(failure.reason, ValidationReason::Size);
    }

    #[test]
    fn duration_failure_only_when_duration_is_the_violation() {
        let c = candidate("video/mp4", 1_000, 12.0);
        let failure = validate(&c, &ctx(), CharacterOrientation::Image).unwrap_err();
        assert_eq!(failure.reason, ValidationReason::Duration);
        // Same clip fits the wider video-orientation cap.
        assert!(validate(&c, &ctx(), CharacterOrientation::Video).is_ok());
    }

    #[test]
    fn non_finite_duration_is_a_duration_failure() {
        let c = candidate("video/mp4", 1_000, f64::NAN);
        let failure = validate(&c, &ctx(), CharacterOrientation::Video).unwrap_err();
        assert_eq!(failure.reason, ValidationReason::Duration);
    }

    // -- route --------------------------------------------------------------

    #[test]
    fn overlong_video_routes_to_trim_at_cap() {
        let c = candidate("video/mp4", 1_000, 45.0);
        let decision = route(&c, &ctx(), CharacterOrientation::Video).unwrap();
        assert_eq!(decision, AdmissionDecision::Trim { target_secs: 30.0 });
    }

    #[test]
    fn too_short_video_is_rejected_without_trim() {
        let mut model = ctx();
        model.min_video_duration_secs = 10.0;
        model.orientation_duration_caps = Some(OrientationDurationCaps {
            image_secs: 30.0,
            video_secs: 30.0,
        });
        let c = candidate("video/mp4", 1_000, 2.0);
        let decision = route(&c, &model, CharacterOrientation::Image).unwrap();
        assert_matches!(
            decision,
            AdmissionDecision::Reject(ValidationFailure { reason: ValidationReason::Duration, .. })
        );
    }

    #[test]
    fn size_failure_is_rejected_even_if_also_too_long() {
        let c = candidate("video/mp4", u64::MAX, 45.0);
        let decision = route(&c, &ctx(), CharacterOrientation::Video).unwrap();
        assert_matches!(
            decision,
            AdmissionDecision::Reject(ValidationFailure { reason: ValidationReason::Size, .. })
        );
    }

    #[test]
    fn image_only_model_does_not_accept_reference_video() {
        let model = ModelContext::lookup(MODEL_KLING_PRO).unwrap();
        let c = candidate("video/mp4", 1_000, 5.0);
        assert_matches!(
            route(&c, &model, CharacterOrientation::Image),
            Err(CoreError::UnsupportedModel(_))
        );
    }

    #[test]
    fn trim_request_carries_scope() {
        let c = candidate("video/mp4", 1_000, 45.0);
        let request = trim_request(&c, 30.0, VideoTarget::Global);
        assert_eq!(request.target_secs, 30.0);
        assert_eq!(request.scope, VideoTarget::Global);
        assert_eq!(request.path, c.path);
    }

    // -- admit --------------------------------------------------------------

    #[test]
    fn admit_wraps_valid_candidate() {
        let previews = PreviewRegistry::new();
        let video = admit(
            candidate("video/quicktime", 1_000, 5.0),
            &ctx(),
            CharacterOrientation::Image,
            &previews,
        )
        .unwrap();
        assert_eq!(video.duration_secs(), 5.0);
        assert_eq!(previews.live_count(), 1);
    }

    #[test]
    fn admit_refuses_invalid_candidate_without_acquiring_preview() {
        let previews = PreviewRegistry::new();
        let result = admit(
            candidate("video/mp4", 1_000, 45.0),
            &ctx(),
            CharacterOrientation::Image,
            &previews,
        );
        assert_matches!(result, Err(CoreError::Validation(_)));
        assert_eq!(previews.live_count(), 0);
    }
}
