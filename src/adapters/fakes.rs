//! In-memory port implementations for testing and dry runs.
//!
//! Every fake records the calls it receives and can be told to fail, so
//! tests can check both the happy path and the engine's error tolerance.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{FlakeStat, ProtectedBranch, RunNumber, RunResult};
use crate::domain::ports::{BranchGuard, FlakeStore, Notifier, RerunLauncher, ResultAccessor};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A rerun requested through [`ResultAccessor::trigger_rerun`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RerunRequest {
    pub job: String,
    pub run: RunNumber,
    pub count: u32,
}

#[derive(Debug, Default)]
struct AccessorState {
    latest_runs: HashMap<String, RunNumber>,
    results: HashMap<(String, RunNumber), RunResult>,
    reruns: Vec<RerunRequest>,
    result_calls: Vec<(String, RunNumber)>,
    latest_run_calls: usize,
    fail_reruns: bool,
}

/// Scriptable result accessor.
///
/// Jobs without a latest run and runs without a result answer with
/// [`DomainError::ArtifactNotFound`], like an artifact that is not
/// published yet.
#[derive(Debug)]
pub struct FakeResultAccessor {
    details_base: String,
    state: Mutex<AccessorState>,
}

impl FakeResultAccessor {
    pub fn new(details_base: impl Into<String>) -> Self {
        Self {
            details_base: details_base.into(),
            state: Mutex::new(AccessorState::default()),
        }
    }

    pub fn set_latest_run(&self, job: &str, run: RunNumber) {
        lock(&self.state).latest_runs.insert(job.to_string(), run);
    }

    pub fn clear_latest_run(&self, job: &str) {
        lock(&self.state).latest_runs.remove(job);
    }

    pub fn set_result(&self, job: &str, run: RunNumber, result: RunResult) {
        lock(&self.state)
            .results
            .insert((job.to_string(), run), result);
    }

    pub fn remove_result(&self, job: &str, run: RunNumber) {
        lock(&self.state).results.remove(&(job.to_string(), run));
    }

    /// Make every following `trigger_rerun` fail (the call is still recorded).
    pub fn fail_reruns(&self, fail: bool) {
        lock(&self.state).fail_reruns = fail;
    }

    pub fn rerun_requests(&self) -> Vec<RerunRequest> {
        lock(&self.state).reruns.clone()
    }

    /// Every `(job, run)` whose result was asked for, in call order.
    pub fn result_calls(&self) -> Vec<(String, RunNumber)> {
        lock(&self.state).result_calls.clone()
    }

    pub fn latest_run_calls(&self) -> usize {
        lock(&self.state).latest_run_calls
    }
}

#[async_trait]
impl ResultAccessor for FakeResultAccessor {
    async fn latest_run(&self, job: &str) -> DomainResult<RunNumber> {
        let mut state = lock(&self.state);
        state.latest_run_calls += 1;
        state
            .latest_runs
            .get(job)
            .copied()
            .ok_or_else(|| DomainError::ArtifactNotFound(format!("{job}/latest-build.txt")))
    }

    async fn result(&self, job: &str, run: RunNumber) -> DomainResult<RunResult> {
        let mut state = lock(&self.state);
        state.result_calls.push((job.to_string(), run));
        state
            .results
            .get(&(job.to_string(), run))
            .cloned()
            .ok_or_else(|| DomainError::ArtifactNotFound(format!("{job}/{run}/finished.json")))
    }

    async fn trigger_rerun(&self, job: &str, run: RunNumber, count: u32) -> DomainResult<()> {
        let mut state = lock(&self.state);
        state.reruns.push(RerunRequest {
            job: job.to_string(),
            run,
            count,
        });
        if state.fail_reruns {
            return Err(DomainError::RerunFailed {
                job: job.to_string(),
                reason: "rerun rejected by fake".to_string(),
            });
        }
        Ok(())
    }

    fn details_url(&self, job: &str, run: RunNumber) -> String {
        format!("{}/{job}/{run}", self.details_base)
    }
}

/// Flake store keeping every stat in memory.
#[derive(Debug, Default)]
pub struct MemoryFlakeStore {
    stats: Mutex<Vec<FlakeStat>>,
    failing: Mutex<bool>,
}

impl MemoryFlakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every following `store` call.
    pub fn set_failing(&self, failing: bool) {
        *lock(&self.failing) = failing;
    }

    /// Stats stored so far, in call order. Rejected stores are included.
    pub fn stored(&self) -> Vec<FlakeStat> {
        lock(&self.stats).clone()
    }
}

#[async_trait]
impl FlakeStore for MemoryFlakeStore {
    async fn store(&self, _job: &str, _commit: &str, stat: &FlakeStat) -> DomainResult<()> {
        lock(&self.stats).push(stat.clone());
        if *lock(&self.failing) {
            return Err(DomainError::DatabaseError("store rejected by fake".to_string()));
        }
        Ok(())
    }
}

/// Notifier recording every message body.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
    failing: Mutex<bool>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        *lock(&self.failing) = failing;
    }

    pub fn messages(&self) -> Vec<String> {
        lock(&self.messages).clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, body: &str) -> DomainResult<()> {
        lock(&self.messages).push(body.to_string());
        if *lock(&self.failing) {
            return Err(DomainError::NotificationFailed("rejected by fake".to_string()));
        }
        Ok(())
    }
}

/// A call received by [`RecordingBranchGuard`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardAction {
    Block(ProtectedBranch),
    Unblock(ProtectedBranch),
}

/// Branch guard recording every block and unblock.
#[derive(Debug, Default)]
pub struct RecordingBranchGuard {
    actions: Mutex<Vec<GuardAction>>,
    failing: Mutex<bool>,
}

impl RecordingBranchGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        *lock(&self.failing) = failing;
    }

    pub fn actions(&self) -> Vec<GuardAction> {
        lock(&self.actions).clone()
    }

    fn record(&self, action: GuardAction) -> DomainResult<()> {
        let target = match &action {
            GuardAction::Block(target) | GuardAction::Unblock(target) => target.to_string(),
        };
        lock(&self.actions).push(action);
        if *lock(&self.failing) {
            return Err(DomainError::BranchGuardFailed {
                target,
                reason: "rejected by fake".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl BranchGuard for RecordingBranchGuard {
    async fn block(&self, target: &ProtectedBranch) -> DomainResult<()> {
        self.record(GuardAction::Block(target.clone()))
    }

    async fn unblock(&self, target: &ProtectedBranch) -> DomainResult<()> {
        self.record(GuardAction::Unblock(target.clone()))
    }
}

/// Rerun launcher recording `(job, run_id)` pairs.
#[derive(Debug, Default)]
pub struct RecordingRerunLauncher {
    launches: Mutex<Vec<(String, String)>>,
}

impl RecordingRerunLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn launches(&self) -> Vec<(String, String)> {
        lock(&self.launches).clone()
    }
}

#[async_trait]
impl RerunLauncher for RecordingRerunLauncher {
    async fn launch(&self, job: &str, run_id: &str) -> DomainResult<()> {
        lock(&self.launches).push((job.to_string(), run_id.to_string()));
        Ok(())
    }
}
