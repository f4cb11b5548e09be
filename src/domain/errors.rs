//! Domain errors for the flakeguard reconciliation system.

use thiserror::Error;

/// Domain-level errors raised by ports and their adapters.
///
/// None of these are fatal to the reconcile loop; the engine logs them and
/// carries on with the next run, job or cycle.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Artifact not found: {0}")]
    ArtifactNotFound(String),

    #[error("Failed to fetch artifact {path}: {reason}")]
    ArtifactFetch { path: String, reason: String },

    #[error("Malformed artifact {path}: {reason}")]
    MalformedArtifact { path: String, reason: String },

    #[error("Rerun of {job} failed: {reason}")]
    RerunFailed { job: String, reason: String },

    #[error("Notification failed: {0}")]
    NotificationFailed(String),

    #[error("Branch guard failed for {target}: {reason}")]
    BranchGuardFailed { target: String, reason: String },

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

impl DomainError {
    /// Whether the error means the artifact simply is not published yet.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::ArtifactNotFound(_))
    }
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

impl From<reqwest::Error> for DomainError {
    fn from(err: reqwest::Error) -> Self {
        DomainError::ArtifactFetch {
            path: err.url().map(ToString::to_string).unwrap_or_default(),
            reason: err.to_string(),
        }
    }
}
