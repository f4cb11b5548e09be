use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::{ArtifactSource, Config};

/// Default project config file, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "flakeguard.yaml";

/// Optional local overrides, merged over the project config.
pub const LOCAL_CONFIG_FILE: &str = "flakeguard.local.yaml";

/// Prefix of environment variable overrides.
pub const ENV_PREFIX: &str = "FLAKEGUARD_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No jobs configured. Add at least one entry to `jobs`")]
    NoJobs,

    #[error("Job {0:?} is listed more than once")]
    DuplicateJob(String),

    #[error("Job names cannot be empty")]
    EmptyJobName,

    #[error("Invalid rerun_budget: 0. Must be at least 1")]
    InvalidRerunBudget,

    #[error("Invalid poll_interval_secs: 0. Must be positive")]
    InvalidPollInterval,

    #[error("Invalid pending_timeout_secs: 0. Must be positive")]
    InvalidPendingTimeout,

    #[error("Invalid max_concurrent_jobs: 0. Must be at least 1")]
    InvalidConcurrency,

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidLogRotation(String),

    #[error("Artifact bucket cannot be empty")]
    EmptyBucket,

    #[error("Filesystem artifact source requires `artifacts.root`")]
    MissingArtifactRoot,

    #[error("Notifier is enabled but `notifier.webhook_url` is not set")]
    MissingWebhookUrl,

    #[error("Invalid notifier time_zone: {0}. Must be an IANA zone name such as America/Los_Angeles")]
    InvalidTimeZone(String),

    #[error("Branch guard is enabled but `branch_guard.{0}` is empty")]
    IncompleteBranchGuard(&'static str),

    #[error("Invalid max_retries: {0}. Cannot be 0")]
    InvalidMaxRetries(u32),

    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must be less than max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),

    #[error("Rerun program cannot be empty")]
    EmptyRerunProgram,
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. flakeguard.yaml in the working directory
    /// 3. flakeguard.local.yaml (optional overrides)
    /// 4. Environment variables (FLAKEGUARD_* prefix, highest priority)
    pub fn load() -> Result<Config> {
        Self::load_layered(DEFAULT_CONFIG_FILE)
    }

    /// Same layering as [`ConfigLoader::load`] with `path` as the project
    /// config.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("Config file {} does not exist", path.display());
        }
        Self::load_layered(path)
    }

    fn load_layered(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        let config = Self::figment(path)
            .extract::<Config>()
            .with_context(|| format!("Failed to load config from {}", path.display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// The provider stack behind [`ConfigLoader::load`].
    pub fn figment(path: &Path) -> Figment {
        let local = path.with_file_name(LOCAL_CONFIG_FILE);
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path))
            .merge(Yaml::file(local))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        // Jobs
        if config.jobs.is_empty() {
            return Err(ConfigError::NoJobs);
        }
        if config.jobs.iter().chain(&config.presubmit_jobs).any(|job| job.trim().is_empty()) {
            return Err(ConfigError::EmptyJobName);
        }
        let mut seen = HashSet::new();
        if let Some(job) = config.jobs.iter().find(|job| !seen.insert(job.as_str())) {
            return Err(ConfigError::DuplicateJob(job.clone()));
        }

        // Engine
        let engine = &config.engine;
        if engine.rerun_budget == 0 {
            return Err(ConfigError::InvalidRerunBudget);
        }
        if engine.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidPollInterval);
        }
        if engine.pending_timeout_secs == 0 {
            return Err(ConfigError::InvalidPendingTimeout);
        }
        if engine.max_concurrent_jobs == 0 {
            return Err(ConfigError::InvalidConcurrency);
        }

        // Logging
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidLogRotation(config.logging.rotation.clone()));
        }

        // Artifacts
        match config.artifacts.source {
            ArtifactSource::Http if config.artifacts.bucket.trim().is_empty() => {
                return Err(ConfigError::EmptyBucket);
            }
            ArtifactSource::Filesystem
                if config.artifacts.root.as_deref().map_or(true, |r| r.trim().is_empty()) =>
            {
                return Err(ConfigError::MissingArtifactRoot);
            }
            _ => {}
        }

        // Notifier
        if config.notifier.enabled
            && config.notifier.webhook_url.as_deref().map_or(true, |u| u.trim().is_empty())
        {
            return Err(ConfigError::MissingWebhookUrl);
        }
        if config.notifier.time_zone.parse::<chrono_tz::Tz>().is_err() {
            return Err(ConfigError::InvalidTimeZone(config.notifier.time_zone.clone()));
        }

        // Branch guard
        let guard = &config.branch_guard;
        if guard.enabled {
            for (field, value) in [("owner", &guard.owner), ("repo", &guard.repo), ("branch", &guard.branch)] {
                if value.trim().is_empty() {
                    return Err(ConfigError::IncompleteBranchGuard(field));
                }
            }
        }

        // Rerun
        if config.rerun.program.trim().is_empty() {
            return Err(ConfigError::EmptyRerunProgram);
        }
        if config.rerun.max_retries == 0 {
            return Err(ConfigError::InvalidMaxRetries(config.rerun.max_retries));
        }
        if config.rerun.initial_backoff_ms >= config.rerun.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                config.rerun.initial_backoff_ms,
                config.rerun.max_backoff_ms,
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn valid_config() -> Config {
        Config {
            jobs: vec!["istio-postsubmit".to_string()],
            ..Config::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.engine.poll_interval_secs, 300);
        assert_eq!(config.engine.rerun_budget, 2);
        assert_eq!(config.engine.pending_timeout_secs, 7200);
        assert_eq!(config.flake_store.database_url, "sqlite:.flakeguard/flakes.db");
        assert_eq!(config.logging.level, "info");
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::NoJobs)));
        ConfigLoader::validate(&valid_config()).expect("Config with a job should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
jobs:
  - istio-postsubmit
  - e2e-simple
presubmit_jobs:
  - istio-presubmit
engine:
  poll_interval_secs: 60
  rerun_budget: 5
  catch_flakes_by_rerun: false
artifacts:
  source: filesystem
  root: /var/mirror
logging:
  level: debug
  format: pretty
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.jobs, vec!["istio-postsubmit", "e2e-simple"]);
        assert_eq!(config.presubmit_jobs, vec!["istio-presubmit"]);
        assert_eq!(config.engine.poll_interval_secs, 60);
        assert_eq!(config.engine.rerun_budget, 5);
        assert!(!config.engine.catch_flakes_by_rerun);
        assert_eq!(config.engine.pending_timeout_secs, 7200);
        assert_eq!(config.artifacts.source, ArtifactSource::Filesystem);
        assert_eq!(config.artifacts.root.as_deref(), Some("/var/mirror"));
        assert_eq!(config.logging.format, "pretty");

        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_validate_duplicate_job() {
        let mut config = valid_config();
        config.jobs.push("istio-postsubmit".to_string());

        match ConfigLoader::validate(&config) {
            Err(ConfigError::DuplicateJob(job)) => assert_eq!(job, "istio-postsubmit"),
            other => panic!("Expected DuplicateJob error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_engine_bounds() {
        let mut config = valid_config();
        config.engine.rerun_budget = 0;
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::InvalidRerunBudget)));

        let mut config = valid_config();
        config.engine.poll_interval_secs = 0;
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::InvalidPollInterval)));

        let mut config = valid_config();
        config.engine.pending_timeout_secs = 0;
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::InvalidPendingTimeout)));

        let mut config = valid_config();
        config.engine.max_concurrent_jobs = 0;
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::InvalidConcurrency)));
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = valid_config();
        config.logging.level = "invalid".to_string();

        match ConfigLoader::validate(&config) {
            Err(ConfigError::InvalidLogLevel(level)) => assert_eq!(level, "invalid"),
            other => panic!("Expected InvalidLogLevel error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_invalid_log_format() {
        let mut config = valid_config();
        config.logging.format = "xml".to_string();

        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidLogFormat(format)) if format == "xml"
        ));
    }

    #[test]
    fn test_validate_filesystem_source_needs_root() {
        let mut config = valid_config();
        config.artifacts.source = ArtifactSource::Filesystem;
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::MissingArtifactRoot)));

        config.artifacts.root = Some("/var/mirror".to_string());
        assert!(ConfigLoader::validate(&config).is_ok());
    }

    #[test]
    fn test_validate_http_source_needs_bucket() {
        let mut config = valid_config();
        config.artifacts.bucket = String::new();
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::EmptyBucket)));
    }

    #[test]
    fn test_validate_enabled_notifier_needs_url() {
        let mut config = valid_config();
        config.notifier.enabled = true;
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::MissingWebhookUrl)));

        config.notifier.webhook_url = Some("https://hooks.example/alert".to_string());
        assert!(ConfigLoader::validate(&config).is_ok());
    }

    #[test]
    fn test_validate_notifier_time_zone() {
        let mut config = valid_config();
        assert_eq!(config.notifier.time_zone, "America/Los_Angeles");

        config.notifier.time_zone = "Europe/Berlin".to_string();
        assert!(ConfigLoader::validate(&config).is_ok());

        config.notifier.time_zone = "PST8PDT-ish".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidTimeZone(zone)) if zone == "PST8PDT-ish"
        ));
    }

    #[test]
    fn test_validate_enabled_guard_needs_target() {
        let mut config = valid_config();
        config.branch_guard.enabled = true;
        config.branch_guard.owner = "istio".to_string();

        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::IncompleteBranchGuard("repo"))
        ));
    }

    #[test]
    fn test_validate_zero_max_retries() {
        let mut config = valid_config();
        config.rerun.max_retries = 0;

        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidMaxRetries(0))
        ));
    }

    #[test]
    fn test_validate_invalid_backoff() {
        let mut config = valid_config();
        config.rerun.initial_backoff_ms = 30000;
        config.rerun.max_backoff_ms = 10000;

        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidBackoff(30000, 10000))
        ));
    }

    #[test]
    fn test_load_from_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ConfigLoader::load_from_file(dir.path().join("nope.yaml")).is_err());
    }

    #[test]
    fn test_local_file_and_env_override() {
        let dir = tempfile::tempdir().unwrap();
        let main = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(
            &main,
            "jobs: [istio-postsubmit]\nengine:\n  rerun_budget: 3\n  poll_interval_secs: 120\nlogging:\n  level: info\n",
        )
        .unwrap();
        std::fs::write(dir.path().join(LOCAL_CONFIG_FILE), "engine:\n  rerun_budget: 4\n").unwrap();

        temp_env::with_vars(
            [
                ("FLAKEGUARD_LOGGING__LEVEL", Some("debug")),
                ("FLAKEGUARD_ENGINE__POLL_INTERVAL_SECS", Some("30")),
            ],
            || {
                let config = ConfigLoader::load_from_file(&main).unwrap();
                assert_eq!(config.engine.rerun_budget, 4, "Local file should win over project file");
                assert_eq!(config.engine.poll_interval_secs, 30, "Env should win over files");
                assert_eq!(config.logging.level, "debug");
                assert_eq!(config.jobs, vec!["istio-postsubmit"]);
            },
        );
    }

    #[test]
    fn test_hierarchical_merging() {
        let mut base_file = NamedTempFile::new().unwrap();
        writeln!(
            base_file,
            "jobs: [a]\nengine:\n  rerun_budget: 2\nlogging:\n  level: info\n  format: json"
        )
        .unwrap();
        base_file.flush().unwrap();

        let mut override_file = NamedTempFile::new().unwrap();
        writeln!(override_file, "engine:\n  rerun_budget: 6\nlogging:\n  level: debug").unwrap();
        override_file.flush().unwrap();

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(base_file.path()))
            .merge(Yaml::file(override_file.path()))
            .extract()
            .unwrap();

        assert_eq!(config.engine.rerun_budget, 6, "Override should win");
        assert_eq!(config.logging.level, "debug", "Override should win for nested fields");
        assert_eq!(config.logging.format, "json", "Base value should persist when not overridden");
        assert_eq!(config.jobs, vec!["a"]);
    }
}
