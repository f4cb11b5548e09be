//! Rerun launcher shelling out to the CI control plane.

use async_trait::async_trait;
use backoff::future::retry_notify;
use backoff::{Error as BackoffError, ExponentialBackoff, ExponentialBackoffBuilder};
use std::io::ErrorKind;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::RerunConfig;
use crate::domain::ports::RerunLauncher;

const RUN_ID_PLACEHOLDER: &str = "{run_id}";
const JOB_PLACEHOLDER: &str = "{job}";

/// Runs `program args...` once per rerun, with `{run_id}` and `{job}`
/// substituted in every argument.
///
/// Non-zero exits are retried with exponential backoff up to `max_retries`
/// attempts in total. A program that cannot be found is not retried.
#[derive(Debug, Clone)]
pub struct CommandRerunLauncher {
    program: String,
    args: Vec<String>,
    max_retries: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl CommandRerunLauncher {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self::from(&RerunConfig {
            program: program.into(),
            args,
            ..RerunConfig::default()
        })
    }

    #[must_use]
    pub fn with_retries(mut self, max_retries: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        self.max_retries = max_retries.max(1);
        self.initial_backoff = initial_backoff;
        self.max_backoff = max_backoff.max(initial_backoff);
        self
    }

    fn render_args(&self, job: &str, run_id: &str) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| arg.replace(RUN_ID_PLACEHOLDER, run_id).replace(JOB_PLACEHOLDER, job))
            .collect()
    }

    fn policy(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_backoff)
            .with_max_interval(self.max_backoff)
            .with_max_elapsed_time(None)
            .build()
    }

    /// Every failure becomes permanent once `max_retries` attempts are used.
    fn give_up_after(&self, attempt: u32, err: DomainError) -> BackoffError<DomainError> {
        if attempt >= self.max_retries {
            BackoffError::permanent(err)
        } else {
            BackoffError::transient(err)
        }
    }

    async fn run_once(&self, job: &str, args: &[String], attempt: u32) -> Result<(), BackoffError<DomainError>> {
        let failed = |reason: String| DomainError::RerunFailed {
            job: job.to_string(),
            reason,
        };

        let output = Command::new(&self.program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                let err = failed(format!("failed to run {}: {e}", self.program));
                if e.kind() == ErrorKind::NotFound {
                    BackoffError::permanent(err)
                } else {
                    self.give_up_after(attempt, err)
                }
            })?;

        if output.status.success() {
            return Ok(());
        }

        let err = failed(format!(
            "{} exited with {}: {}",
            self.program,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        ));
        Err(self.give_up_after(attempt, err))
    }
}

impl From<&RerunConfig> for CommandRerunLauncher {
    fn from(config: &RerunConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            max_retries: config.max_retries.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms.max(config.initial_backoff_ms)),
        }
    }
}

#[async_trait]
impl RerunLauncher for CommandRerunLauncher {
    async fn launch(&self, job: &str, run_id: &str) -> DomainResult<()> {
        let args = self.render_args(job, run_id);
        let attempts = AtomicU32::new(0);

        retry_notify(
            self.policy(),
            || {
                let attempt = attempts.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(job, run_id, attempt, program = %self.program, "running rerun command");
                self.run_once(job, &args, attempt)
            },
            |err: DomainError, wait: Duration| {
                warn!(job, run_id, error = %err, retry_in_ms = wait.as_millis() as u64, "rerun command failed, retrying");
            },
        )
        .await
    }
}
