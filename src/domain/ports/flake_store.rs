//! Flake store port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::FlakeStat;

/// Append-only sink for completed rerun campaigns.
#[async_trait]
pub trait FlakeStore: Send + Sync {
    /// Persist the statistic of one completed campaign.
    async fn store(&self, job: &str, commit: &str, stat: &FlakeStat) -> DomainResult<()>;
}
