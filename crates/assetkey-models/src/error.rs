//! Validation error type shared by the identity, format and URL modules.

use thiserror::Error;

/// Result type for pure model operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Malformed input detected before any remote call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    #[error("Stored identity for {key} is invalid: {reason}")]
    StoredIdentity { key: String, reason: String },

    #[error("Invalid asset URL: {0}")]
    InvalidUrl(String),
}

impl ValidationError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field,
            reason: reason.into(),
        }
    }

    pub fn stored_identity(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StoredIdentity {
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_url(reason: impl Into<String>) -> Self {
        Self::InvalidUrl(reason.into())
    }

    /// The flat key this error refers to, when it came from stored metadata.
    pub fn key(&self) -> Option<&str> {
        match self {
            ValidationError::StoredIdentity { key, .. } => Some(key),
            _ => None,
        }
    }
}
