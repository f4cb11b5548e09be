//! Rerun campaigns and the flake statistics they produce.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// In-flight rerun campaign for one (job, commit) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlakeCampaign {
    job: String,
    commit: String,
    completed: u32,
    failures: u32,
}

impl FlakeCampaign {
    /// Open a campaign. The run that triggered it is not counted.
    pub fn new(job: impl Into<String>, commit: impl Into<String>) -> Self {
        Self {
            job: job.into(),
            commit: commit.into(),
            completed: 0,
            failures: 0,
        }
    }

    pub fn job(&self) -> &str {
        &self.job
    }

    pub fn commit(&self) -> &str {
        &self.commit
    }

    /// Reruns observed so far.
    pub const fn completed(&self) -> u32 {
        self.completed
    }

    /// Observed reruns that failed.
    pub const fn failures(&self) -> u32 {
        self.failures
    }

    /// Count one more resolved run at this commit.
    ///
    /// Returns `true` once `budget` runs have been counted. Never counts past
    /// the budget.
    pub fn record(&mut self, passed: bool, budget: u32) -> bool {
        if self.completed < budget {
            self.completed += 1;
            if !passed {
                self.failures += 1;
            }
        }
        self.is_complete(budget)
    }

    pub const fn is_complete(&self, budget: u32) -> bool {
        self.completed >= budget
    }

    /// Freeze the campaign into its durable statistic.
    pub fn into_stat(self) -> FlakeStat {
        FlakeStat {
            job: self.job,
            commit: self.commit,
            total_reruns: self.completed,
            failures: self.failures,
        }
    }
}

/// Result of a completed rerun campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlakeStat {
    pub job: String,
    pub commit: String,
    pub total_reruns: u32,
    pub failures: u32,
}

impl FlakeStat {
    /// Fraction of reruns that failed, `0.0` when nothing ran.
    pub fn failure_rate(&self) -> f64 {
        if self.total_reruns == 0 {
            return 0.0;
        }
        f64::from(self.failures) / f64::from(self.total_reruns)
    }

    /// Every rerun failed: likely a real regression rather than a flake.
    pub const fn is_consistent_failure(&self) -> bool {
        self.total_reruns > 0 && self.failures == self.total_reruns
    }
}

/// A stored flake statistic as read back from a flake store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlakeRecord {
    pub id: Uuid,
    #[serde(flatten)]
    pub stat: FlakeStat,
    pub recorded_at: DateTime<Utc>,
}

impl FlakeRecord {
    pub fn new(stat: FlakeStat) -> Self {
        Self {
            id: Uuid::new_v4(),
            stat,
            recorded_at: Utc::now(),
        }
    }
}
