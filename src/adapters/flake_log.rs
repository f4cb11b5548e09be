//! Flake store that keeps nothing and logs each completed campaign.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::FlakeStat;
use crate::domain::ports::FlakeStore;

#[derive(Debug, Clone, Copy, Default)]
pub struct LogFlakeStore;

#[async_trait]
impl FlakeStore for LogFlakeStore {
    async fn store(&self, job: &str, commit: &str, stat: &FlakeStat) -> DomainResult<()> {
        tracing::info!(
            job,
            commit,
            total_reruns = stat.total_reruns,
            failures = stat.failures,
            failure_rate = stat.failure_rate(),
            "flake stat"
        );
        Ok(())
    }
}
