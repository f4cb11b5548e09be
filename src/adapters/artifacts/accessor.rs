//! Result accessor reading CI artifacts from an object store.
//!
//! Layout of a post-submit job in the bucket:
//!
//! ```text
//! {job}/latest-build.txt
//! {job}/{run}/finished.json
//! {job}/{run}/started.json
//! ```
//!
//! Pre-submit jobs keep their index under `directory/{job}`: the latest
//! build lives at `directory/{job}/latest-build.txt` and each run has a
//! `directory/{job}/{run}.txt` pointer holding `gs://{bucket}/{prefix}`,
//! the real location of the run's files.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use super::records::{parse_finished, parse_latest_build, parse_started_node};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{RunNumber, RunResult};
use crate::domain::ports::{ObjectStore, RerunLauncher, ResultAccessor};

const LATEST_BUILD: &str = "latest-build.txt";
const FINISHED: &str = "finished.json";
const STARTED: &str = "started.json";
const PRESUBMIT_DIRECTORY: &str = "directory";

pub struct ArtifactResultAccessor<S: ObjectStore> {
    store: S,
    launcher: Arc<dyn RerunLauncher>,
    details_url: String,
    presubmit_jobs: HashSet<String>,
}

impl<S: ObjectStore> ArtifactResultAccessor<S> {
    pub fn new(store: S, launcher: Arc<dyn RerunLauncher>, details_url: impl Into<String>) -> Self {
        Self {
            store,
            launcher,
            details_url: details_url.into().trim_end_matches('/').to_string(),
            presubmit_jobs: HashSet::new(),
        }
    }

    /// Treat `jobs` as pre-submit jobs.
    #[must_use]
    pub fn with_presubmit_jobs<I, J>(mut self, jobs: I) -> Self
    where
        I: IntoIterator<Item = J>,
        J: Into<String>,
    {
        self.presubmit_jobs.extend(jobs.into_iter().map(Into::into));
        self
    }

    pub fn is_presubmit(&self, job: &str) -> bool {
        self.presubmit_jobs.contains(job)
    }

    fn job_root(&self, job: &str) -> String {
        if self.is_presubmit(job) {
            format!("{PRESUBMIT_DIRECTORY}/{job}")
        } else {
            job.to_string()
        }
    }

    /// Bucket-relative prefix holding the files of one run.
    async fn run_prefix(&self, job: &str, run: RunNumber) -> DomainResult<String> {
        if !self.is_presubmit(job) {
            return Ok(format!("{job}/{run}"));
        }

        let pointer_path = format!("{PRESUBMIT_DIRECTORY}/{job}/{run}.txt");
        let pointer = self.store.read(&pointer_path).await?;
        let pointer = pointer.trim();
        let bucket_prefix = format!("gs://{}/", self.store.bucket());
        let prefix = pointer
            .strip_prefix(&bucket_prefix)
            .ok_or_else(|| DomainError::MalformedArtifact {
                path: pointer_path.clone(),
                reason: format!("expected a {bucket_prefix} link, got {pointer:?}"),
            })?
            .trim_end_matches('/');

        if prefix.is_empty() {
            return Err(DomainError::MalformedArtifact {
                path: pointer_path,
                reason: "empty run prefix".to_string(),
            });
        }
        Ok(prefix.to_string())
    }
}

#[async_trait]
impl<S: ObjectStore> ResultAccessor for ArtifactResultAccessor<S> {
    async fn latest_run(&self, job: &str) -> DomainResult<RunNumber> {
        let path = format!("{}/{LATEST_BUILD}", self.job_root(job));
        let raw = self.store.read(&path).await?;
        parse_latest_build(&path, &raw)
    }

    async fn result(&self, job: &str, run: RunNumber) -> DomainResult<RunResult> {
        let path = format!("{}/{FINISHED}", self.run_prefix(job, run).await?);
        let raw = self.store.read(&path).await?;
        parse_finished(&path, &raw)
    }

    async fn trigger_rerun(&self, job: &str, run: RunNumber, count: u32) -> DomainResult<()> {
        let path = format!("{}/{STARTED}", self.run_prefix(job, run).await?);
        let raw = self.store.read(&path).await?;
        let node = parse_started_node(&path, &raw)?;

        let mut first_error = None;
        for attempt in 1..=count {
            debug!(job, run, node = %node, attempt, count, "launching rerun");
            if let Err(err) = self.launcher.launch(job, &node).await {
                warn!(job, run, node = %node, attempt, error = %err, "rerun launch failed");
                first_error.get_or_insert(err);
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    fn details_url(&self, job: &str, run: RunNumber) -> String {
        format!("{}/{job}/{run}", self.details_url)
    }
}
