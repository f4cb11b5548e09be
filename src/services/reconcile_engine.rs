//! Reconcile engine.
//!
//! Polls every watched job once per cycle, advances each job's
//! [`JobState`], runs rerun campaigns for failing commits and reports the
//! cycle's failures to the notifier and the branch guard:
//! - job history is only replayed from the latest run at startup
//! - unreadable runs are retried each cycle until the pending timeout
//! - a failing commit gets exactly one rerun campaign at a time
//! - nothing an external system does can stop the loop except the stop signal

use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::domain::models::{
    CampaignUpdate, EngineSettings, Failure, JobState, PendingOutcome, ProtectedBranch, RunNumber,
    RunResult,
};
use crate::domain::ports::{BranchGuard, FlakeStore, Notifier, ResultAccessor};
use crate::services::alert::format_failures;

/// Configuration for the reconcile engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Time between two cycles.
    pub poll_interval: Duration,
    /// Reruns requested per flake campaign.
    pub rerun_budget: u32,
    /// Whether failing runs start rerun campaigns.
    pub catch_flakes_by_rerun: bool,
    /// How long a run may stay unreadable before it is abandoned.
    pub pending_timeout: Duration,
    /// Jobs reconciled concurrently within one cycle.
    pub max_concurrent_jobs: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from(&EngineSettings::default())
    }
}

impl From<&EngineSettings> for EngineConfig {
    fn from(settings: &EngineSettings) -> Self {
        Self {
            poll_interval: Duration::from_secs(settings.poll_interval_secs),
            rerun_budget: settings.rerun_budget,
            catch_flakes_by_rerun: settings.catch_flakes_by_rerun,
            pending_timeout: Duration::from_secs(settings.pending_timeout_secs),
            max_concurrent_jobs: settings.max_concurrent_jobs,
        }
    }
}

/// What one cycle observed and did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// Sequence number of the cycle, starting at 1.
    pub cycle: u64,
    /// Failing runs resolved this cycle, grouped by job in watch order.
    pub failures: Vec<Failure>,
    /// Jobs whose latest run could be read.
    pub jobs_checked: usize,
    /// Jobs skipped because their latest run could not be read.
    pub jobs_skipped: usize,
    pub runs_resolved: usize,
    pub runs_pending: usize,
    pub runs_abandoned: usize,
    pub campaigns_started: usize,
    pub campaigns_completed: usize,
}

impl CycleReport {
    fn absorb(&mut self, job: JobReport) {
        if job.skipped {
            self.jobs_skipped += 1;
        } else {
            self.jobs_checked += 1;
        }
        self.failures.extend(job.failures);
        self.runs_resolved += job.runs_resolved;
        self.runs_pending += job.runs_pending;
        self.runs_abandoned += job.runs_abandoned;
        self.campaigns_started += job.campaigns_started;
        self.campaigns_completed += job.campaigns_completed;
    }
}

#[derive(Debug, Default)]
struct JobReport {
    skipped: bool,
    failures: Vec<Failure>,
    runs_resolved: usize,
    runs_pending: usize,
    runs_abandoned: usize,
    campaigns_started: usize,
    campaigns_completed: usize,
}

/// Shared, read-only view of the engine used while job states are borrowed
/// mutably.
struct JobReconciler<'a> {
    accessor: &'a dyn ResultAccessor,
    flake_store: &'a dyn FlakeStore,
    config: &'a EngineConfig,
}

impl JobReconciler<'_> {
    async fn reconcile(&self, state: &mut JobState) -> JobReport {
        let mut report = JobReport::default();
        let job = state.name().to_string();

        let current = match self.accessor.latest_run(&job).await {
            Ok(run) => run,
            Err(err) => {
                warn!(job = %job, error = %err, "failed to read latest run, skipping job this cycle");
                report.skipped = true;
                return report;
            }
        };

        let previously_checked = state.last_checked_run();
        let plan = state.plan_cycle(current);
        debug!(
            job = %job,
            current,
            previously_checked,
            pending = ?plan.pending,
            "checking job"
        );

        for run in plan.runs() {
            self.process_run(state, run, &mut report).await;
        }

        state.finish_cycle(current);
        debug!(job = %job, last_checked = state.last_checked_run(), "finished checking job");
        report
    }

    async fn process_run(&self, state: &mut JobState, run: RunNumber, report: &mut JobReport) {
        let job = state.name().to_string();

        let result = match self.accessor.result(&job, run).await {
            Ok(result) => result,
            Err(err) => {
                match state.record_unavailable(run, Instant::now(), self.config.pending_timeout) {
                    PendingOutcome::FirstSeen | PendingOutcome::StillPending => {
                        debug!(job = %job, run, error = %err, "result still pending");
                        report.runs_pending += 1;
                    }
                    PendingOutcome::Abandoned => {
                        warn!(
                            job = %job,
                            run,
                            timeout_secs = self.config.pending_timeout.as_secs(),
                            "giving up on run, result never became available"
                        );
                        report.runs_abandoned += 1;
                    }
                }
                return;
            }
        };

        if state.record_available(run) {
            info!(job = %job, run, "formerly pending result is now available");
        }
        report.runs_resolved += 1;
        info!(job = %job, run, passed = result.passed, commit = %result.commit, "run resolved");

        if self.config.catch_flakes_by_rerun {
            self.apply_flake_policy(state, run, &result, report).await;
        }

        if !result.passed {
            report.failures.push(Failure::new(job, run));
        }
    }

    async fn apply_flake_policy(
        &self,
        state: &mut JobState,
        run: RunNumber,
        result: &RunResult,
        report: &mut JobReport,
    ) {
        let budget = self.config.rerun_budget;
        match state.apply_flake_policy(result, budget) {
            CampaignUpdate::Untouched => {}
            CampaignUpdate::Started { commit } => {
                report.campaigns_started += 1;
                info!(job = %state.name(), run, commit = %commit, budget, "starting rerun campaign");
                if let Err(err) = self.accessor.trigger_rerun(state.name(), run, budget).await {
                    warn!(job = %state.name(), run, error = %err, "failed to trigger reruns");
                }
            }
            CampaignUpdate::Progressed {
                commit,
                completed,
                failures,
            } => {
                debug!(job = %state.name(), commit = %commit, completed, failures, budget, "campaign progressed");
            }
            CampaignUpdate::Completed(stat) => {
                report.campaigns_completed += 1;
                info!(
                    job = %stat.job,
                    commit = %stat.commit,
                    total_reruns = stat.total_reruns,
                    failures = stat.failures,
                    "rerun campaign completed"
                );
                if let Err(err) = self.flake_store.store(&stat.job, &stat.commit, &stat).await {
                    error!(job = %stat.job, commit = %stat.commit, error = %err, "failed to store flake stat");
                }
            }
        }
    }
}

/// The reconcile loop over all watched jobs.
pub struct ReconcileEngine {
    jobs: Vec<JobState>,
    accessor: Arc<dyn ResultAccessor>,
    flake_store: Arc<dyn FlakeStore>,
    notifier: Option<Arc<dyn Notifier>>,
    branch_guard: Option<Arc<dyn BranchGuard>>,
    protected_branches: Vec<ProtectedBranch>,
    config: EngineConfig,
    cycles: u64,
}

impl ReconcileEngine {
    /// Create an engine watching `jobs`. Duplicate job names are watched once.
    pub fn new<I, S>(
        jobs: I,
        accessor: Arc<dyn ResultAccessor>,
        flake_store: Arc<dyn FlakeStore>,
        mut config: EngineConfig,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        config.rerun_budget = config.rerun_budget.max(1);
        config.max_concurrent_jobs = config.max_concurrent_jobs.max(1);

        let mut states: Vec<JobState> = Vec::new();
        for name in jobs {
            let name = name.into();
            if states.iter().all(|state| state.name() != name) {
                states.push(JobState::new(name));
            }
        }

        Self {
            jobs: states,
            accessor,
            flake_store,
            notifier: None,
            branch_guard: None,
            protected_branches: Vec::new(),
            config,
            cycles: 0,
        }
    }

    /// Send an alert for every cycle with failures.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Block `targets` while the latest cycle has failures.
    #[must_use]
    pub fn with_branch_guard(
        mut self,
        guard: Arc<dyn BranchGuard>,
        targets: Vec<ProtectedBranch>,
    ) -> Self {
        self.branch_guard = Some(guard);
        self.protected_branches = targets;
        self
    }

    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Read-only view of the per-job state, for status output and tests.
    pub fn job_states(&self) -> &[JobState] {
        &self.jobs
    }

    pub fn job_state(&self, job: &str) -> Option<&JobState> {
        self.jobs.iter().find(|state| state.name() == job)
    }

    /// Number of cycles run so far.
    pub const fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Run cycles until `shutdown` is cancelled.
    ///
    /// Cancellation is observed before each cycle and during the sleep
    /// between cycles; a cycle that has started runs to completion.
    pub async fn run(&mut self, shutdown: CancellationToken) {
        info!(
            jobs = self.jobs.len(),
            poll_interval_secs = self.config.poll_interval.as_secs(),
            rerun_budget = self.config.rerun_budget,
            catch_flakes_by_rerun = self.config.catch_flakes_by_rerun,
            "reconcile engine started"
        );

        while !shutdown.is_cancelled() {
            let report = self.run_cycle().await;
            debug!(
                cycle = report.cycle,
                failures = report.failures.len(),
                sleep_secs = self.config.poll_interval.as_secs(),
                "cycle finished, sleeping"
            );

            tokio::select! {
                () = shutdown.cancelled() => break,
                () = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }

        info!(cycles = self.cycles, "received stop signal, reconcile engine exiting");
    }

    /// Run a single cycle over every watched job and report its failures.
    pub async fn run_cycle(&mut self) -> CycleReport {
        self.cycles += 1;
        let span = info_span!("cycle", cycle = self.cycles);
        self.reconcile_all().instrument(span).await
    }

    async fn reconcile_all(&mut self) -> CycleReport {
        let reconciler = JobReconciler {
            accessor: self.accessor.as_ref(),
            flake_store: self.flake_store.as_ref(),
            config: &self.config,
        };

        // `buffered` keeps job order, so the failure batch is deterministic.
        let job_reports: Vec<JobReport> = stream::iter(self.jobs.iter_mut())
            .map(|state| reconciler.reconcile(state))
            .buffered(self.config.max_concurrent_jobs)
            .collect()
            .await;

        let mut report = CycleReport {
            cycle: self.cycles,
            ..CycleReport::default()
        };
        for job_report in job_reports {
            report.absorb(job_report);
        }

        self.dispatch(&report.failures).await;
        report
    }

    async fn dispatch(&self, failures: &[Failure]) {
        if let Some(notifier) = &self.notifier {
            if failures.is_empty() {
                info!("no new failures in last cycle");
            } else {
                info!(count = failures.len(), "jobs failed in last cycle");
                let body = format_failures(failures, self.accessor.as_ref());
                if let Err(err) = notifier.send(&body).await {
                    error!(error = %err, "unable to send alert");
                }
            }
        }

        if let Some(guard) = &self.branch_guard {
            for target in &self.protected_branches {
                let outcome = if failures.is_empty() {
                    guard.unblock(target).await
                } else {
                    guard.block(target).await
                };
                if let Err(err) = outcome {
                    error!(
                        branch = %target,
                        block = !failures.is_empty(),
                        error = %err,
                        "branch guard update failed"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::fakes::{FakeResultAccessor, MemoryFlakeStore};

    fn engine(accessor: Arc<FakeResultAccessor>, config: EngineConfig) -> ReconcileEngine {
        ReconcileEngine::new(
            ["job-1"],
            accessor,
            Arc::new(MemoryFlakeStore::new()),
            config,
        )
    }

    #[test]
    fn test_config_from_settings() {
        let config = EngineConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(300));
        assert_eq!(config.rerun_budget, 2);
        assert!(config.catch_flakes_by_rerun);
        assert_eq!(config.pending_timeout, Duration::from_secs(7200));
    }

    #[test]
    fn test_new_normalizes_config_and_dedups_jobs() {
        let accessor = Arc::new(FakeResultAccessor::new("https://details"));
        let engine = ReconcileEngine::new(
            ["job-1", "job-2", "job-1"],
            accessor,
            Arc::new(MemoryFlakeStore::new()),
            EngineConfig {
                rerun_budget: 0,
                max_concurrent_jobs: 0,
                ..EngineConfig::default()
            },
        );
        assert_eq!(engine.job_states().len(), 2);
        assert_eq!(engine.config().rerun_budget, 1);
        assert_eq!(engine.config().max_concurrent_jobs, 1);
    }

    #[tokio::test]
    async fn test_skipped_job_keeps_sentinel() {
        let accessor = Arc::new(FakeResultAccessor::new("https://details"));
        let mut engine = engine(accessor, EngineConfig::default());

        let report = engine.run_cycle().await;
        assert_eq!(report.jobs_skipped, 1);
        assert_eq!(report.jobs_checked, 0);
        assert!(engine.job_state("job-1").is_some_and(JobState::is_unseen));
    }

    #[tokio::test]
    async fn test_cycle_counter_advances() {
        let accessor = Arc::new(FakeResultAccessor::new("https://details"));
        accessor.set_latest_run("job-1", 3);
        accessor.set_result("job-1", 3, RunResult::passed("abc"));
        let mut engine = engine(accessor, EngineConfig::default());

        assert_eq!(engine.run_cycle().await.cycle, 1);
        assert_eq!(engine.run_cycle().await.cycle, 2);
        assert_eq!(engine.cycles(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_during_sleep() {
        let accessor = Arc::new(FakeResultAccessor::new("https://details"));
        accessor.set_latest_run("job-1", 1);
        accessor.set_result("job-1", 1, RunResult::passed("abc"));
        let mut engine = engine(accessor.clone(), EngineConfig::default());

        let shutdown = CancellationToken::new();
        let stopper = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            stopper.cancel();
        });

        engine.run(shutdown).await;
        assert_eq!(engine.cycles(), 1);
    }

    #[tokio::test]
    async fn test_run_with_cancelled_token_does_nothing() {
        let accessor = Arc::new(FakeResultAccessor::new("https://details"));
        let mut engine = engine(accessor.clone(), EngineConfig::default());

        let shutdown = CancellationToken::new();
        shutdown.cancel();
        engine.run(shutdown).await;

        assert_eq!(engine.cycles(), 0);
        assert_eq!(accessor.latest_run_calls(), 0);
    }
}
