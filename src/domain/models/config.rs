use serde::{Deserialize, Serialize};

/// Main configuration structure for flakeguard
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Post-submit jobs to watch
    #[serde(default)]
    pub jobs: Vec<String>,

    /// Jobs whose artifacts are laid out as pre-submit runs
    #[serde(default)]
    pub presubmit_jobs: Vec<String>,

    /// Reconcile loop configuration
    #[serde(default)]
    pub engine: EngineSettings,

    /// Artifact store configuration
    #[serde(default)]
    pub artifacts: ArtifactsConfig,

    /// Rerun command configuration
    #[serde(default)]
    pub rerun: RerunConfig,

    /// Alert configuration
    #[serde(default)]
    pub notifier: NotifierConfig,

    /// Merge-blocking configuration
    #[serde(default)]
    pub branch_guard: BranchGuardConfig,

    /// Flake statistics persistence
    #[serde(default)]
    pub flake_store: FlakeStoreConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Reconcile loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EngineSettings {
    /// Seconds between two polls of the watched jobs
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Reruns requested per flake campaign
    #[serde(default = "default_rerun_budget")]
    pub rerun_budget: u32,

    /// Whether failing runs start rerun campaigns
    #[serde(default = "default_true")]
    pub catch_flakes_by_rerun: bool,

    /// Seconds a run may stay unreadable before it is given up on
    #[serde(default = "default_pending_timeout_secs")]
    pub pending_timeout_secs: u64,

    /// Jobs reconciled concurrently within one cycle
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
}

const fn default_poll_interval_secs() -> u64 {
    300
}

const fn default_rerun_budget() -> u32 {
    2
}

const fn default_true() -> bool {
    true
}

const fn default_pending_timeout_secs() -> u64 {
    120 * 60
}

const fn default_max_concurrent_jobs() -> usize {
    4
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            rerun_budget: default_rerun_budget(),
            catch_flakes_by_rerun: default_true(),
            pending_timeout_secs: default_pending_timeout_secs(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
        }
    }
}

/// Where run artifacts are read from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactSource {
    /// Public object store over HTTP
    #[default]
    Http,
    /// Local mirror of the bucket
    Filesystem,
}

/// Artifact store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ArtifactsConfig {
    /// Backend used to read artifacts
    #[serde(default)]
    pub source: ArtifactSource,

    /// Base URL of the object store (http source)
    #[serde(default = "default_artifacts_base_url")]
    pub base_url: String,

    /// Bucket holding the job artifacts
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Root directory of the local mirror (filesystem source)
    #[serde(default)]
    pub root: Option<String>,

    /// Prefix of the per-run links put in alerts
    #[serde(default = "default_details_url")]
    pub details_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_artifacts_base_url() -> String {
    "https://storage.googleapis.com".to_string()
}

fn default_bucket() -> String {
    "istio-prow".to_string()
}

fn default_details_url() -> String {
    "https://k8s-gubernator.appspot.com/build/istio-prow".to_string()
}

const fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            source: ArtifactSource::default(),
            base_url: default_artifacts_base_url(),
            bucket: default_bucket(),
            root: None,
            details_url: default_details_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Rerun command configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RerunConfig {
    /// Program invoked once per requested rerun
    #[serde(default = "default_rerun_program")]
    pub program: String,

    /// Arguments; `{run_id}` is replaced with the run's node identifier
    #[serde(default = "default_rerun_args")]
    pub args: Vec<String>,

    /// Attempts per rerun before giving up
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff delay in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff delay in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_rerun_program() -> String {
    "kubectl".to_string()
}

fn default_rerun_args() -> Vec<String> {
    vec![
        "create".to_string(),
        "-f".to_string(),
        "https://prow.istio.io/rerun?prowjob={run_id}".to_string(),
    ]
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    60_000
}

const fn default_max_backoff_ms() -> u64 {
    300_000
}

impl Default for RerunConfig {
    fn default() -> Self {
        Self {
            program: default_rerun_program(),
            args: default_rerun_args(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Alert configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct NotifierConfig {
    /// Send alerts for failing cycles
    #[serde(default)]
    pub enabled: bool,

    /// Endpoint receiving the alert as JSON
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Subject line; the send time is appended
    #[serde(default = "default_subject")]
    pub subject: String,

    /// Text placed before the failure list
    #[serde(default = "default_prologue")]
    pub prologue: String,

    /// Text placed after the failure list
    #[serde(default)]
    pub epilogue: String,

    /// IANA time zone used to stamp the subject
    #[serde(default = "default_time_zone")]
    pub time_zone: String,
}

fn default_time_zone() -> String {
    "America/Los_Angeles".to_string()
}

fn default_subject() -> String {
    "ATTENTION - Post-Submit Test Failed ".to_string()
}

fn default_prologue() -> String {
    "Post-submit is failing, please take a look at the following failure(s):\n\n".to_string()
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            webhook_url: None,
            subject: default_subject(),
            prologue: default_prologue(),
            epilogue: String::new(),
            time_zone: default_time_zone(),
        }
    }
}

/// Merge-blocking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BranchGuardConfig {
    /// Block merges on the protected branch while post-submit fails
    #[serde(default)]
    pub enabled: bool,

    /// GitHub REST API base URL
    #[serde(default = "default_github_api_url")]
    pub api_url: String,

    /// Repository owner
    #[serde(default)]
    pub owner: String,

    /// Repository name
    #[serde(default)]
    pub repo: String,

    /// Protected branch
    #[serde(default = "default_branch")]
    pub branch: String,

    /// File holding the API token
    #[serde(default)]
    pub token_file: Option<String>,

    /// Environment variable holding the API token when no file is given
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Required status check added while merges are blocked
    #[serde(default = "default_block_context")]
    pub block_context: String,
}

fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_branch() -> String {
    "master".to_string()
}

fn default_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}

fn default_block_context() -> String {
    "merges-blocked-needs-admin".to_string()
}

impl Default for BranchGuardConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_url: default_github_api_url(),
            owner: String::new(),
            repo: String::new(),
            branch: default_branch(),
            token_file: None,
            token_env: default_token_env(),
            block_context: default_block_context(),
        }
    }
}

/// Flake statistics persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FlakeStoreConfig {
    /// `SQLite` database URL
    #[serde(default = "default_database_url")]
    pub database_url: String,
}

fn default_database_url() -> String {
    "sqlite:.flakeguard/flakes.db".to_string()
}

impl Default for FlakeStoreConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; console only when unset
    #[serde(default)]
    pub log_dir: Option<String>,

    /// Rotation of the log files: daily, hourly or never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}
