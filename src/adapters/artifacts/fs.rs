//! Object store backed by a local mirror of the bucket.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::ObjectStore;

#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
    bucket: String,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>, bucket: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            bucket: bucket.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> DomainResult<PathBuf> {
        let relative = Path::new(path);
        if !relative.components().all(|c| matches!(c, Component::Normal(_))) {
            return Err(DomainError::ArtifactFetch {
                path: path.to_string(),
                reason: "path escapes the artifact root".to_string(),
            });
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn read(&self, path: &str) -> DomainResult<String> {
        let full = self.resolve(path)?;
        tokio::fs::read_to_string(&full).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => DomainError::ArtifactNotFound(path.to_string()),
            _ => DomainError::ArtifactFetch {
                path: path.to_string(),
                reason: e.to_string(),
            },
        })
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_existing_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("job")).unwrap();
        std::fs::write(dir.path().join("job/latest-build.txt"), "12").unwrap();
        let store = FsObjectStore::new(dir.path(), "bucket");

        assert_eq!(store.read("job/latest-build.txt").await.unwrap(), "12");
        assert!(store.read("job/13/finished.json").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_rejects_parent_components() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path(), "bucket");

        let err = store.read("../etc/passwd").await.unwrap_err();
        assert!(matches!(err, DomainError::ArtifactFetch { .. }));
    }
}
