//! Object store reading a public bucket over HTTP.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::ObjectStore;

/// Reads `{base_url}/{bucket}/{path}` with plain GET requests.
#[derive(Debug, Clone)]
pub struct HttpObjectStore {
    http: Client,
    base_url: String,
    bucket: String,
}

impl HttpObjectStore {
    pub fn new(base_url: &str, bucket: impl Into<String>, timeout: Duration) -> DomainResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("flakeguard/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DomainError::ValidationFailed(format!("HTTP client setup failed: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            bucket: bucket.into(),
        })
    }

    fn object_url(&self, path: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.bucket, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn read(&self, path: &str) -> DomainResult<String> {
        let url = self.object_url(path);
        let resp = self.http.get(&url).send().await.map_err(|e| DomainError::ArtifactFetch {
            path: path.to_string(),
            reason: e.to_string(),
        })?;

        match resp.status() {
            StatusCode::NOT_FOUND => Err(DomainError::ArtifactNotFound(path.to_string())),
            status if !status.is_success() => Err(DomainError::ArtifactFetch {
                path: path.to_string(),
                reason: format!("GET {url} returned {status}"),
            }),
            _ => Ok(resp.text().await?),
        }
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_url_joins_segments() {
        let store = HttpObjectStore::new(
            "https://storage.googleapis.com/",
            "istio-prow",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            store.object_url("job/12/finished.json"),
            "https://storage.googleapis.com/istio-prow/job/12/finished.json"
        );
    }
}
