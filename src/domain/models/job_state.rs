//! Per-job reconciliation state.
//!
//! A [`JobState`] remembers, for one watched job, how far the run history has
//! been checked, which runs are still waiting for their result to be
//! published, and which commits have a rerun campaign in flight. It is only
//! ever touched by the reconcile engine, one cycle at a time.

use std::collections::{BTreeMap, HashMap};
use std::ops::RangeInclusive;
use std::time::Duration;
use tokio::time::Instant;

use super::flake::{FlakeCampaign, FlakeStat};
use super::job::{RunNumber, RunResult};

/// What happened to a run whose result could not be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingOutcome {
    /// First failed read; the run is now tracked as pending.
    FirstSeen,
    /// Still inside the pending timeout; retried next cycle.
    StillPending,
    /// Timed out and dropped from tracking. Counted as neither pass nor fail.
    Abandoned,
}

/// Effect of a resolved result on the job's rerun campaigns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CampaignUpdate {
    /// Flake catching is off, a passing run with no campaign, or a run
    /// without a known commit.
    Untouched,
    /// A failing run opened a campaign; reruns must be triggered now.
    Started { commit: String },
    /// The run counted towards an active campaign.
    Progressed {
        commit: String,
        completed: u32,
        failures: u32,
    },
    /// The budget is exhausted; the campaign has been removed.
    Completed(FlakeStat),
}

/// Runs to look at during one cycle, in processing order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CyclePlan {
    /// Previously pending runs, ascending.
    pub pending: Vec<RunNumber>,
    /// Runs never looked at before, ascending.
    pub fresh: RangeInclusive<RunNumber>,
    /// Latest run reported by the accessor this cycle.
    pub current: RunNumber,
}

impl CyclePlan {
    /// Every run of the plan in the order it must be processed.
    pub fn runs(&self) -> impl Iterator<Item = RunNumber> + '_ {
        self.pending.iter().copied().chain(self.fresh.clone())
    }
}

/// Tracking state for one watched job.
#[derive(Debug, Clone)]
pub struct JobState {
    name: String,
    last_checked_run: RunNumber,
    pending_first_seen: BTreeMap<RunNumber, Instant>,
    rerun_campaigns: HashMap<String, FlakeCampaign>,
}

impl JobState {
    /// Fresh state; `last_checked_run` starts at the unseen sentinel.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            last_checked_run: 0,
            pending_first_seen: BTreeMap::new(),
            rerun_campaigns: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn last_checked_run(&self) -> RunNumber {
        self.last_checked_run
    }

    /// No cycle has completed for this job yet.
    pub const fn is_unseen(&self) -> bool {
        self.last_checked_run == 0
    }

    /// Runs whose result is still unavailable, ascending.
    pub fn pending_runs(&self) -> Vec<RunNumber> {
        self.pending_first_seen.keys().copied().collect()
    }

    pub fn is_pending(&self, run: RunNumber) -> bool {
        self.pending_first_seen.contains_key(&run)
    }

    pub fn campaign(&self, commit: &str) -> Option<&FlakeCampaign> {
        self.rerun_campaigns.get(commit)
    }

    pub fn active_campaigns(&self) -> usize {
        self.rerun_campaigns.len()
    }

    /// Work out which runs this cycle has to process.
    ///
    /// On the first cycle the history before `current` is skipped: the job is
    /// treated as checked up to `current - 1`.
    pub fn plan_cycle(&mut self, current: RunNumber) -> CyclePlan {
        if self.is_unseen() {
            self.last_checked_run = current.saturating_sub(1);
        }
        CyclePlan {
            pending: self.pending_runs(),
            fresh: (self.last_checked_run + 1)..=current,
            current,
        }
    }

    /// Advance the checked watermark. It never moves backwards.
    pub fn finish_cycle(&mut self, current: RunNumber) {
        self.last_checked_run = self.last_checked_run.max(current);
    }

    /// Record a failed attempt to read `run`'s result.
    pub fn record_unavailable(
        &mut self,
        run: RunNumber,
        now: Instant,
        timeout: Duration,
    ) -> PendingOutcome {
        match self.pending_first_seen.get(&run) {
            Some(first_seen) if now.saturating_duration_since(*first_seen) > timeout => {
                self.pending_first_seen.remove(&run);
                PendingOutcome::Abandoned
            }
            Some(_) => PendingOutcome::StillPending,
            None => {
                self.pending_first_seen.insert(run, now);
                PendingOutcome::FirstSeen
            }
        }
    }

    /// The result of `run` is available. Returns whether it had been pending.
    pub fn record_available(&mut self, run: RunNumber) -> bool {
        self.pending_first_seen.remove(&run).is_some()
    }

    /// Apply the flake-detection policy to a resolved result.
    ///
    /// A run at a commit with an active campaign counts towards it. A failing
    /// run at a commit without one opens a campaign. Runs with an empty
    /// commit never take part in a campaign. `budget` must be at least one.
    pub fn apply_flake_policy(&mut self, result: &RunResult, budget: u32) -> CampaignUpdate {
        if result.commit.is_empty() {
            return CampaignUpdate::Untouched;
        }

        if let Some(campaign) = self.rerun_campaigns.get_mut(&result.commit) {
            if campaign.record(result.passed, budget) {
                let stat = self
                    .rerun_campaigns
                    .remove(&result.commit)
                    .map(FlakeCampaign::into_stat);
                return stat.map_or(CampaignUpdate::Untouched, CampaignUpdate::Completed);
            }
            return CampaignUpdate::Progressed {
                commit: result.commit.clone(),
                completed: campaign.completed(),
                failures: campaign.failures(),
            };
        }

        if result.passed {
            return CampaignUpdate::Untouched;
        }

        self.rerun_campaigns.insert(
            result.commit.clone(),
            FlakeCampaign::new(self.name.clone(), result.commit.clone()),
        );
        CampaignUpdate::Started {
            commit: result.commit.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(120 * 60);

    #[test]
    fn test_first_cycle_skips_history() {
        let mut state = JobState::new("job-1");
        let plan = state.plan_cycle(5);
        assert_eq!(state.last_checked_run(), 4);
        assert_eq!(plan.runs().collect::<Vec<_>>(), vec![5]);
    }

    #[test]
    fn test_first_cycle_with_no_runs() {
        let mut state = JobState::new("job-1");
        let plan = state.plan_cycle(0);
        assert_eq!(plan.runs().count(), 0);
        state.finish_cycle(0);
        assert!(state.is_unseen());
    }

    #[test]
    fn test_plan_covers_gap_since_last_check() {
        let mut state = JobState::new("job-1");
        state.plan_cycle(5);
        state.finish_cycle(5);

        let plan = state.plan_cycle(8);
        assert_eq!(plan.runs().collect::<Vec<_>>(), vec![6, 7, 8]);
    }

    #[test]
    fn test_pending_runs_come_first_and_ascending() {
        let mut state = JobState::new("job-1");
        let now = Instant::now();
        state.plan_cycle(10);
        state.record_unavailable(9, now, TIMEOUT);
        state.record_unavailable(4, now, TIMEOUT);
        state.finish_cycle(10);

        let plan = state.plan_cycle(11);
        assert_eq!(plan.runs().collect::<Vec<_>>(), vec![4, 9, 11]);
    }

    #[test]
    fn test_watermark_never_moves_backwards() {
        let mut state = JobState::new("job-1");
        state.plan_cycle(10);
        state.finish_cycle(10);

        let plan = state.plan_cycle(7);
        assert_eq!(plan.runs().count(), 0);
        state.finish_cycle(7);
        assert_eq!(state.last_checked_run(), 10);
    }

    #[test]
    fn test_pending_lifecycle_resolves() {
        let mut state = JobState::new("job-1");
        let now = Instant::now();
        assert_eq!(state.record_unavailable(7, now, TIMEOUT), PendingOutcome::FirstSeen);
        assert_eq!(
            state.record_unavailable(7, now + Duration::from_secs(60), TIMEOUT),
            PendingOutcome::StillPending
        );
        assert!(state.record_available(7));
        assert!(!state.is_pending(7));
        assert!(!state.record_available(7));
    }

    #[test]
    fn test_pending_run_abandoned_after_timeout() {
        let mut state = JobState::new("job-1");
        let now = Instant::now();
        state.record_unavailable(7, now, TIMEOUT);
        assert_eq!(
            state.record_unavailable(7, now + TIMEOUT, TIMEOUT),
            PendingOutcome::StillPending
        );
        assert_eq!(
            state.record_unavailable(7, now + TIMEOUT + Duration::from_secs(1), TIMEOUT),
            PendingOutcome::Abandoned
        );
        assert!(state.pending_runs().is_empty());
    }

    #[test]
    fn test_failure_opens_single_campaign() {
        let mut state = JobState::new("job-1");
        assert_eq!(
            state.apply_flake_policy(&RunResult::failed("abc"), 3),
            CampaignUpdate::Started { commit: "abc".into() }
        );
        assert_eq!(
            state.apply_flake_policy(&RunResult::failed("abc"), 3),
            CampaignUpdate::Progressed {
                commit: "abc".into(),
                completed: 1,
                failures: 1,
            }
        );
        assert_eq!(state.active_campaigns(), 1);
    }

    #[test]
    fn test_pass_without_campaign_is_untouched() {
        let mut state = JobState::new("job-1");
        assert_eq!(
            state.apply_flake_policy(&RunResult::passed("abc"), 3),
            CampaignUpdate::Untouched
        );
        assert_eq!(state.active_campaigns(), 0);
    }

    #[test]
    fn test_campaign_completes_at_budget() {
        let mut state = JobState::new("job-1");
        state.apply_flake_policy(&RunResult::failed("abc"), 2);
        state.apply_flake_policy(&RunResult::passed("abc"), 2);
        let update = state.apply_flake_policy(&RunResult::failed("abc"), 2);

        assert_eq!(
            update,
            CampaignUpdate::Completed(FlakeStat {
                job: "job-1".into(),
                commit: "abc".into(),
                total_reruns: 2,
                failures: 1,
            })
        );
        assert!(state.campaign("abc").is_none());
    }

    #[test]
    fn test_campaigns_are_keyed_by_commit() {
        let mut state = JobState::new("job-1");
        state.apply_flake_policy(&RunResult::failed("abc"), 2);
        state.apply_flake_policy(&RunResult::failed("def"), 2);
        assert_eq!(state.active_campaigns(), 2);
        assert_eq!(state.campaign("abc").map(FlakeCampaign::completed), Some(0));
    }

    #[test]
    fn test_run_without_commit_never_opens_campaign() {
        let mut state = JobState::new("job-1");
        assert_eq!(
            state.apply_flake_policy(&RunResult::failed(""), 2),
            CampaignUpdate::Untouched
        );
        assert_eq!(state.active_campaigns(), 0);
    }
}
