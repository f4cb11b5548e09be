//! Common test utilities for integration tests
//!
//! Shared fixtures for building engines over in-memory fakes and for laying
//! out artifact trees on disk.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use flakeguard::adapters::fakes::{FakeResultAccessor, MemoryFlakeStore};
use flakeguard::{EngineConfig, ReconcileEngine, RunResult};

pub const DETAILS_BASE: &str = "https://gubernator.example/build/istio-prow";

/// Fakes wired into an engine, kept around for assertions.
pub struct Harness {
    pub accessor: Arc<FakeResultAccessor>,
    pub store: Arc<MemoryFlakeStore>,
    pub engine: ReconcileEngine,
}

/// Engine config with the given budget and defaults otherwise.
pub fn config(rerun_budget: u32) -> EngineConfig {
    EngineConfig {
        rerun_budget,
        poll_interval: Duration::from_secs(300),
        pending_timeout: Duration::from_secs(120 * 60),
        ..EngineConfig::default()
    }
}

pub fn harness(jobs: &[&str], config: EngineConfig) -> Harness {
    let accessor = Arc::new(FakeResultAccessor::new(DETAILS_BASE));
    let store = Arc::new(MemoryFlakeStore::new());
    let engine = ReconcileEngine::new(jobs.iter().copied(), accessor.clone(), store.clone(), config);
    Harness {
        accessor,
        store,
        engine,
    }
}

/// Publish `result` as run `run` of `job` and make it the latest run.
pub fn publish(accessor: &FakeResultAccessor, job: &str, run: u64, result: RunResult) {
    accessor.set_result(job, run, result);
    accessor.set_latest_run(job, run);
}

/// Write `contents` at `relative` under `root`, creating parent directories.
pub fn write_artifact(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create artifact directory");
    }
    std::fs::write(path, contents).expect("Failed to write artifact");
}

pub fn finished_json(passed: bool, commit: &str) -> String {
    serde_json::json!({
        "timestamp": 1_530_000_000,
        "result": if passed { "SUCCESS" } else { "FAILURE" },
        "passed": passed,
        "metadata": { "repo": "istio/istio", "repo-commit": commit },
    })
    .to_string()
}

pub fn started_json(node: &str) -> String {
    serde_json::json!({ "node": node, "timestamp": 1_530_000_000 }).to_string()
}
