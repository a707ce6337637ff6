//! Domain error types

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid input: {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("Invalid job state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Actual tokens already recorded for job {0}")]
    TokensAlreadyRecorded(String),

    #[error("Unknown subscription tier: {0}")]
    UnknownTier(String),

    #[error("Invalid provider id: {0}")]
    InvalidProvider(String),
}

impl DomainError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        DomainError::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// Check if this error came from input validation
    pub fn is_validation(&self) -> bool {
        matches!(self, DomainError::Validation { .. })
    }
}
