//! Classified provider failures.

use std::time::Duration;

use thiserror::Error;

/// Whether a failed generation is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Transient,
    Permanent,
}

/// Failure of a single `generate` call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("provider request timed out")]
    Timeout,

    #[error("provider rate limit exceeded")]
    RateLimited { retry_after: Option<Duration> },

    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("invalid request: {0}")]
    InvalidInput(String),

    #[error("content policy violation: {0}")]
    ContentPolicy(String),

    #[error("provider rejected credentials: {0}")]
    Unauthorized(String),

    #[error("unexpected provider response: {0}")]
    InvalidResponse(String),
}

impl GenerationError {
    pub fn class(&self) -> ErrorClass {
        match self {
            GenerationError::Timeout
            | GenerationError::RateLimited { .. }
            | GenerationError::Unavailable(_) => ErrorClass::Transient,
            GenerationError::InvalidInput(_)
            | GenerationError::ContentPolicy(_)
            | GenerationError::Unauthorized(_)
            | GenerationError::InvalidResponse(_) => ErrorClass::Permanent,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.class() == ErrorClass::Transient
    }

    /// Provider-supplied minimum wait before the next attempt.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            GenerationError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}
