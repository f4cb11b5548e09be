//! Result accessor port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{RunNumber, RunResult};

/// Read access to job runs plus the one side effect the engine needs:
/// asking the CI system to rerun a job.
#[async_trait]
pub trait ResultAccessor: Send + Sync {
    /// Highest run number that exists for `job`, finished or not.
    async fn latest_run(&self, job: &str) -> DomainResult<RunNumber>;

    /// Result of a finished run.
    ///
    /// Fails while the run is still executing or its result is not yet
    /// published. Callers treat every error as "still pending".
    async fn result(&self, job: &str, run: RunNumber) -> DomainResult<RunResult>;

    /// Request `count` reruns of the job at `run`, best effort.
    async fn trigger_rerun(&self, job: &str, run: RunNumber, count: u32) -> DomainResult<()>;

    /// Human-facing link to a run.
    fn details_url(&self, job: &str, run: RunNumber) -> String;
}
