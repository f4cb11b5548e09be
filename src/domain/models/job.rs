//! Jobs, runs and the values that flow out of a reconcile cycle.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Monotonically increasing identifier of one run of a job.
///
/// `0` is never a real run; job state uses it as the "unseen" sentinel.
pub type RunNumber = u64;

/// Outcome of one finished run as published by the artifact store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    /// Whether the run succeeded.
    pub passed: bool,
    /// Commit the run was executed against.
    pub commit: String,
}

impl RunResult {
    /// A passing result at `commit`.
    pub fn passed(commit: impl Into<String>) -> Self {
        Self {
            passed: true,
            commit: commit.into(),
        }
    }

    /// A failing result at `commit`.
    pub fn failed(commit: impl Into<String>) -> Self {
        Self {
            passed: false,
            commit: commit.into(),
        }
    }
}

/// One failing run observed during the current cycle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Failure {
    pub job: String,
    pub run: RunNumber,
}

impl Failure {
    pub fn new(job: impl Into<String>, run: RunNumber) -> Self {
        Self {
            job: job.into(),
            run,
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.job, self.run)
    }
}

/// A branch whose merges are suspended while post-submit is red.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProtectedBranch {
    pub owner: String,
    pub repo: String,
    pub branch: String,
}

impl ProtectedBranch {
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            branch: branch.into(),
        }
    }
}

impl fmt::Display for ProtectedBranch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.owner, self.repo, self.branch)
    }
}
