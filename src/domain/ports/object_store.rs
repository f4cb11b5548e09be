//! Object store port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;

/// Read-only access to the bucket that CI publishes run artifacts into.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Read an object as text.
    ///
    /// Must fail with [`DomainError::ArtifactNotFound`] when the object does
    /// not exist (yet).
    ///
    /// [`DomainError::ArtifactNotFound`]: crate::domain::errors::DomainError::ArtifactNotFound
    async fn read(&self, path: &str) -> DomainResult<String>;

    /// Name of the bucket, used to strip `gs://{bucket}/` prefixes.
    fn bucket(&self) -> &str;
}
