// src/error.rs
// Domain error taxonomy. The HTTP layer maps these onto status codes; the
// turn driver maps provider/store failures onto stream events.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QuorumError {
    /// Config rejected at debate creation. Carries the offending field path.
    #[error("Validation failed for {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("Debate {0} not found")]
    NotFound(String),

    /// Pause/resume attempted from the wrong state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// LLM API failure on a primary participant call.
    #[error("Provider error: {0}")]
    Provider(String),

    /// Persistence failure inside the quality pipeline.
    #[error("Store error: {0}")]
    Store(String),

    /// Invariant violation. Never silently continued.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl QuorumError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

pub type QuorumResult<T> = Result<T, QuorumError>;
