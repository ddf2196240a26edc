use std::fmt;

use serde::Serialize;

/// Which admission check rejected a candidate reference video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationReason {
    Format,
    Size,
    Duration,
}

impl fmt::Display for ValidationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Format => f.write_str("format"),
            Self::Size => f.write_str("size"),
            Self::Duration => f.write_str("duration"),
        }
    }
}

/// A failed admission check together with a user-facing message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationFailure {
    pub reason: ValidationReason,
    pub message: String,
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} check failed: {}", self.reason, self.message)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Scene limit reached: the active model allows at most {max} scenes")]
    CapacityExceeded { max: usize },

    #[error("Validation failed: {0}")]
    Validation(ValidationFailure),

    #[error("Frame extraction failed: {0}")]
    Extraction(String),

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Unsupported model: {0}")]
    UnsupportedModel(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },
}

/// A reorder request that was out of bounds or would not change anything.
///
/// Not an error: callers keep the queue they already have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReorderNoop;
