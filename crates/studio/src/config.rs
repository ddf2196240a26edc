//! Studio configuration loaded from environment variables.

use std::time::Duration;

use sceneforge_core::model_context::{ModelContext, MODEL_KLING_PRO};
use sceneforge_core::style::StylePreset;

/// A variable was present but could not be used.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got '{value}'")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("{var}: {message}")]
    Unsupported { var: &'static str, message: String },
}

/// Runtime settings for the studio and the `sceneforge` binary.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct StudioConfig {
    /// Base URL of the motion director service.
    pub director_url: String,
    /// Credential for the motion director; auto motion is gated on it.
    pub director_api_key: Option<String>,
    /// HTTP timeout for director calls.
    pub director_timeout: Duration,
    pub style_preset: StylePreset,
    /// Catalog key of the active model.
    pub active_model: String,
    /// Pause between consecutive batch submissions.
    pub submission_delay: Duration,
    /// How long transient notices stay visible.
    pub notice_dismiss_after: Duration,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            director_url: "http://localhost:8001".to_string(),
            director_api_key: None,
            director_timeout: Duration::from_secs(180),
            style_preset: StylePreset::default(),
            active_model: MODEL_KLING_PRO.to_string(),
            submission_delay: Duration::from_millis(500),
            notice_dismiss_after: Duration::from_secs(6),
        }
    }
}

impl StudioConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                 |
    /// |---------------------------|-------------------------|
    /// | `MOTION_DIRECTOR_URL`     | `http://localhost:8001` |
    /// | `MOTION_DIRECTOR_API_KEY` | unset                   |
    /// | `MOTION_STYLE_PRESET`     | `cinematic_narrative`   |
    /// | `ACTIVE_MODEL`            | `kling-2.6-pro`         |
    /// | `SUBMISSION_DELAY_MS`     | `500`                   |
    /// | `NOTICE_DISMISS_SECS`     | `6`                     |
    /// | `DIRECTOR_TIMEOUT_SECS`   | `180`                   |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let director_url = lookup("MOTION_DIRECTOR_URL").unwrap_or(defaults.director_url);
        let director_api_key = lookup("MOTION_DIRECTOR_API_KEY")
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());

        let style_preset = match lookup("MOTION_STYLE_PRESET") {
            Some(value) => StylePreset::parse(&value).map_err(|_| ConfigError::Invalid {
                var: "MOTION_STYLE_PRESET",
                expected: "a known style preset",
                value,
            })?,
            None => defaults.style_preset,
        };

        let active_model = lookup("ACTIVE_MODEL").unwrap_or(defaults.active_model);
        ModelContext::lookup(&active_model).map_err(|e| ConfigError::Unsupported {
            var: "ACTIVE_MODEL",
            message: e.to_string(),
        })?;

        let submission_delay =
            Duration::from_millis(parse_u64(&lookup, "SUBMISSION_DELAY_MS", 500)?);
        let notice_dismiss_after =
            Duration::from_secs(parse_u64(&lookup, "NOTICE_DISMISS_SECS", 6)?);
        let director_timeout =
            Duration::from_secs(parse_u64(&lookup, "DIRECTOR_TIMEOUT_SECS", 180)?);

        Ok(Self {
            director_url,
            director_api_key,
            director_timeout,
            style_preset,
            active_model,
            submission_delay,
            notice_dismiss_after,
        })
    }
}

fn parse_u64(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: u64,
) -> Result<u64, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            var,
            expected: "a non-negative integer",
            value,
        }),
    }
}
