//! `flakeguard run`: wire the adapters and drive the reconcile engine.

use anyhow::{Context, Result};
use clap::Args;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::adapters::artifacts::{ArtifactResultAccessor, FsObjectStore, HttpObjectStore};
use crate::adapters::github::GitHubBranchGuard;
use crate::adapters::notify::{LogNotifier, WebhookNotifier};
use crate::adapters::rerun::CommandRerunLauncher;
use crate::adapters::sqlite::{initialize_database, SqliteFlakeStore};
use crate::adapters::LogFlakeStore;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{ArtifactSource, Config, ProtectedBranch};
use crate::domain::ports::{FlakeStore, Notifier, RerunLauncher, ResultAccessor};
use crate::infrastructure::logging::{LogConfig, LoggerImpl};
use crate::services::{AlertTemplate, CycleReport, EngineConfig, ReconcileEngine};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Run a single cycle, print its report and exit
    #[arg(long)]
    pub once: bool,
}

pub async fn execute(args: RunArgs, config_path: Option<&Path>, json: bool) -> Result<()> {
    let config = crate::cli::load_config(config_path)?;
    let log_config = LogConfig::try_from(&config.logging).map_err(anyhow::Error::msg)?;
    let _logger = LoggerImpl::init(&log_config)?;

    let mut engine = build_engine(&config).await?;

    if args.once {
        let report = engine.run_cycle().await;
        output(&CycleOutput::from(report), json);
        return Ok(());
    }

    let shutdown = CancellationToken::new();
    let stopper = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, stopping after the current cycle");
        }
        stopper.cancel();
    });

    engine.run(shutdown).await;
    Ok(())
}

/// Build an engine with the adapters selected by `config`.
pub async fn build_engine(config: &Config) -> Result<ReconcileEngine> {
    let launcher: Arc<dyn RerunLauncher> = Arc::new(CommandRerunLauncher::from(&config.rerun));
    let accessor = build_accessor(config, launcher)?;

    let flake_store: Arc<dyn FlakeStore> = if config.flake_store.database_url.trim().is_empty() {
        Arc::new(LogFlakeStore)
    } else {
        let pool = initialize_database(&config.flake_store.database_url)
            .await
            .context("Failed to open the flake database")?;
        Arc::new(SqliteFlakeStore::new(pool))
    };

    let template = AlertTemplate::from(&config.notifier);
    let notifier: Arc<dyn Notifier> = match &config.notifier.webhook_url {
        Some(url) if config.notifier.enabled => Arc::new(WebhookNotifier::new(
            url,
            template,
            Duration::from_secs(config.artifacts.request_timeout_secs),
        )?),
        _ => Arc::new(LogNotifier::new(template)),
    };

    let mut engine = ReconcileEngine::new(
        config.jobs.iter().cloned(),
        accessor,
        flake_store,
        EngineConfig::from(&config.engine),
    )
    .with_notifier(notifier);

    if config.branch_guard.enabled {
        let guard = GitHubBranchGuard::from_config(&config.branch_guard)?;
        let target = ProtectedBranch::new(
            &config.branch_guard.owner,
            &config.branch_guard.repo,
            &config.branch_guard.branch,
        );
        engine = engine.with_branch_guard(Arc::new(guard), vec![target]);
    }

    Ok(engine)
}

fn build_accessor(config: &Config, launcher: Arc<dyn RerunLauncher>) -> Result<Arc<dyn ResultAccessor>> {
    let artifacts = &config.artifacts;
    let presubmit = config.presubmit_jobs.iter().cloned();

    let accessor: Arc<dyn ResultAccessor> = match artifacts.source {
        ArtifactSource::Http => {
            let store = HttpObjectStore::new(
                &artifacts.base_url,
                &artifacts.bucket,
                Duration::from_secs(artifacts.request_timeout_secs),
            )?;
            Arc::new(
                ArtifactResultAccessor::new(store, launcher, &artifacts.details_url)
                    .with_presubmit_jobs(presubmit),
            )
        }
        ArtifactSource::Filesystem => {
            let root = artifacts
                .root
                .as_deref()
                .context("`artifacts.root` is required for the filesystem source")?;
            Arc::new(
                ArtifactResultAccessor::new(FsObjectStore::new(root, &artifacts.bucket), launcher, &artifacts.details_url)
                    .with_presubmit_jobs(presubmit),
            )
        }
    };
    Ok(accessor)
}

#[derive(Debug, serde::Serialize)]
pub struct CycleOutput {
    #[serde(flatten)]
    pub report: CycleReport,
}

impl From<CycleReport> for CycleOutput {
    fn from(report: CycleReport) -> Self {
        Self { report }
    }
}

impl CommandOutput for CycleOutput {
    fn to_human(&self) -> String {
        let r = &self.report;
        let mut lines = vec![
            format!("Cycle {}", r.cycle),
            format!("  Jobs:      {} checked, {} skipped", r.jobs_checked, r.jobs_skipped),
            format!(
                "  Runs:      {} resolved, {} pending, {} abandoned",
                r.runs_resolved, r.runs_pending, r.runs_abandoned
            ),
            format!(
                "  Campaigns: {} started, {} completed",
                r.campaigns_started, r.campaigns_completed
            ),
        ];
        if r.failures.is_empty() {
            lines.push("  No failures.".to_string());
        } else {
            lines.push(format!("  Failures ({}):", r.failures.len()));
            lines.extend(r.failures.iter().map(|f| format!("    {f}")));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Failure;

    #[tokio::test]
    async fn test_build_engine_from_filesystem_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config {
            jobs: vec!["e2e".to_string(), "unit".to_string()],
            ..Config::default()
        };
        config.artifacts.source = ArtifactSource::Filesystem;
        config.artifacts.root = Some(dir.path().display().to_string());
        config.flake_store.database_url = format!("sqlite:{}", dir.path().join("flakes.db").display());

        let engine = build_engine(&config).await.unwrap();
        assert_eq!(engine.job_states().len(), 2);
        assert_eq!(engine.config().rerun_budget, 2);
    }

    #[test]
    fn test_cycle_output_lists_failures() {
        let report = CycleReport {
            cycle: 3,
            failures: vec![Failure::new("e2e", 41)],
            jobs_checked: 1,
            ..CycleReport::default()
        };
        let human = CycleOutput::from(report).to_human();
        assert!(human.starts_with("Cycle 3"));
        assert!(human.contains("e2e#41"));
    }
}
