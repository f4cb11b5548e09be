pub mod config;
pub mod flake;
pub mod job;
pub mod job_state;

pub use config::{
    ArtifactSource, ArtifactsConfig, BranchGuardConfig, Config, EngineSettings,
    FlakeStoreConfig, LoggingConfig, NotifierConfig, RerunConfig,
};
pub use flake::{FlakeCampaign, FlakeRecord, FlakeStat};
pub use job::{Failure, ProtectedBranch, RunNumber, RunResult};
pub use job_state::{CampaignUpdate, CyclePlan, JobState, PendingOutcome};
