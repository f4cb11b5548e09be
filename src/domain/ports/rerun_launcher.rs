//! Rerun launcher port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;

/// Starts one rerun of a CI run identified by its control-plane id.
#[async_trait]
pub trait RerunLauncher: Send + Sync {
    async fn launch(&self, job: &str, run_id: &str) -> DomainResult<()>;
}
