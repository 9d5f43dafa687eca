//! Asset error taxonomy and remote failure classification.
//!
//! Only [`RemoteFailure`]s coming back from the collaborator are classified
//! here. Errors this crate raises itself travel unchanged through `?`.

use std::fmt;

use thiserror::Error;

use assetkey_models::ValidationError;

use crate::orchestrator::{MutationKind, MutationStage};
use crate::remote::RemoteFailure;

/// Result type for asset operations.
pub type AssetResult<T> = Result<T, AssetError>;

/// Transport error codes treated as transient network failures.
const NETWORK_ERROR_CODES: &[&str] = &[
    "ETIMEDOUT",
    "ESOCKETTIMEDOUT",
    "ECONNRESET",
    "ECONNREFUSED",
    "ECONNABORTED",
    "ENOTFOUND",
    "EAI_AGAIN",
    "EPIPE",
];

/// Why a remote call failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureCause {
    /// Network error or timeout
    Network(String),
    /// Credentials rejected
    Auth(String),
    /// Store-side failure (status >= 500)
    Server { status: u16, message: String },
    /// Response was missing fields or had the wrong shape
    Malformed(String),
    /// Target already exists
    Conflict(String),
    /// Any other rejection
    Rejected { status: Option<u16>, message: String },
}

impl FailureCause {
    pub fn is_transient(&self) -> bool {
        matches!(self, FailureCause::Network(_) | FailureCause::Server { .. })
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::Network(msg) => write!(f, "network error: {}", msg),
            FailureCause::Auth(msg) => write!(f, "authentication failed: {}", msg),
            FailureCause::Server { status, message } => {
                write!(f, "server error {}: {}", status, message)
            }
            FailureCause::Malformed(msg) => write!(f, "malformed response: {}", msg),
            FailureCause::Conflict(msg) => write!(f, "target already exists: {}", msg),
            FailureCause::Rejected {
                status: Some(status),
                message,
            } => write!(f, "rejected with {}: {}", status, message),
            FailureCause::Rejected {
                status: None,
                message,
            } => write!(f, "rejected: {}", message),
        }
    }
}

/// Failure of a rename-class mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{from} -> {to} failed while {stage}: {cause}")]
pub struct MutationFailure {
    pub from: String,
    pub to: String,
    pub stage: MutationStage,
    pub cause: FailureCause,
}

impl MutationFailure {
    /// The target key was already taken.
    pub fn is_collision(&self) -> bool {
        matches!(self.cause, FailureCause::Conflict(_))
    }

    /// Bytes moved to `to` but the identity metadata there is stale.
    pub fn is_metadata_stale(&self) -> bool {
        self.stage == MutationStage::SyncingMetadata
    }
}

/// Errors returned by asset operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssetError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Asset not found: {key}")]
    NotFound { key: String },

    #[error("Upload failed for {key}: {cause}")]
    Upload { key: String, cause: FailureCause },

    #[error("Replace failed for {key}: {cause}")]
    Replace { key: String, cause: FailureCause },

    #[error("Delete failed for {key}: {cause}")]
    Delete { key: String, cause: FailureCause },

    #[error("Rename failed: {0}")]
    Rename(MutationFailure),

    #[error("Relocate failed: {0}")]
    Relocate(MutationFailure),

    #[error("Fetch failed for {target}: {cause}")]
    Fetch { target: String, cause: FailureCause },
}

impl AssetError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation(ValidationError::invalid(field, reason))
    }

    pub fn malformed(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Fetch {
            target: target.into(),
            cause: FailureCause::Malformed(reason.into()),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AssetError::NotFound { .. })
    }

    /// True if retrying the same call later may succeed.
    pub fn is_transient(&self) -> bool {
        self.cause().map(FailureCause::is_transient).unwrap_or(false)
    }

    /// Remote cause, for errors that came from the store.
    pub fn cause(&self) -> Option<&FailureCause> {
        match self {
            AssetError::Upload { cause, .. }
            | AssetError::Replace { cause, .. }
            | AssetError::Delete { cause, .. }
            | AssetError::Fetch { cause, .. } => Some(cause),
            AssetError::Rename(failure) | AssetError::Relocate(failure) => Some(&failure.cause),
            _ => None,
        }
    }
}

// =============================================================================
// Classification
// =============================================================================

/// The call a remote failure happened in.
#[derive(Debug, Clone)]
pub enum Operation<'a> {
    Upload { key: &'a str },
    Replace { key: &'a str },
    Delete { key: &'a str },
    Fetch { key: &'a str },
    List { prefix: &'a str },
    Mutation {
        kind: MutationKind,
        from: &'a str,
        to: &'a str,
        stage: MutationStage,
    },
}

/// Map a remote failure onto its sub-cause.
pub fn classify_cause(failure: &RemoteFailure) -> FailureCause {
    let message = failure.message.clone();
    let lowered = failure.message.to_ascii_lowercase();

    if let Some(code) = &failure.code {
        if NETWORK_ERROR_CODES.contains(&code.to_ascii_uppercase().as_str()) {
            return FailureCause::Network(format!("{}: {}", code, message));
        }
    }

    match failure.status {
        Some(401) | Some(403) => FailureCause::Auth(message),
        Some(409) => FailureCause::Conflict(message),
        Some(status) if status >= 500 => FailureCause::Server { status, message },
        Some(408) => FailureCause::Network(message),
        _ if lowered.contains("already exists") => FailureCause::Conflict(message),
        None if lowered.contains("timed out") || lowered.contains("timeout") => {
            FailureCause::Network(message)
        }
        status => FailureCause::Rejected { status, message },
    }
}

fn is_not_found(failure: &RemoteFailure) -> bool {
    failure.status == Some(404)
}

/// Classify a remote failure into the error for the operation it hit.
pub fn classify(operation: Operation<'_>, failure: RemoteFailure) -> AssetError {
    match operation {
        Operation::Upload { key } => AssetError::Upload {
            key: key.to_string(),
            cause: classify_cause(&failure),
        },
        Operation::Replace { key } if is_not_found(&failure) => AssetError::not_found(key),
        Operation::Replace { key } => AssetError::Replace {
            key: key.to_string(),
            cause: classify_cause(&failure),
        },
        Operation::Delete { key } if is_not_found(&failure) => AssetError::not_found(key),
        Operation::Delete { key } => AssetError::Delete {
            key: key.to_string(),
            cause: classify_cause(&failure),
        },
        Operation::Fetch { key } if is_not_found(&failure) => AssetError::not_found(key),
        Operation::Fetch { key } => AssetError::Fetch {
            target: key.to_string(),
            cause: classify_cause(&failure),
        },
        Operation::List { prefix } => AssetError::Fetch {
            target: prefix.to_string(),
            cause: classify_cause(&failure),
        },
        Operation::Mutation {
            from,
            stage: MutationStage::RemoteRenaming,
            ..
        } if is_not_found(&failure) => AssetError::not_found(from),
        Operation::Mutation {
            kind,
            from,
            to,
            stage,
        } => {
            let mutation = MutationFailure {
                from: from.to_string(),
                to: to.to_string(),
                stage,
                cause: classify_cause(&failure),
            };
            match kind {
                MutationKind::Relocate => AssetError::Relocate(mutation),
                MutationKind::Rename | MutationKind::ChangePrefix => AssetError::Rename(mutation),
            }
        }
    }
}
