//! Flakeguard - post-submit CI watcher
//!
//! Flakeguard polls CI jobs, reports newly failing runs, reruns failing
//! commits to tell flakes from real breakage and blocks merges into a
//! protected branch while post-submit is red.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): job state, flake campaigns and the port traits
//! - **Service Layer** (`services`): the reconcile engine and alert formatting
//! - **Adapters** (`adapters`): artifact stores, SQLite, GitHub, webhooks, fakes
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use flakeguard::cli::commands::run::build_engine;
//! use flakeguard::infrastructure::config::ConfigLoader;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigLoader::load()?;
//!     let mut engine = build_engine(&config).await?;
//!     let report = engine.run_cycle().await;
//!     println!("{} failure(s)", report.failures.len());
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{
    Config, Failure, FlakeCampaign, FlakeRecord, FlakeStat, JobState, ProtectedBranch, RunNumber,
    RunResult,
};
pub use domain::ports::{BranchGuard, FlakeStore, Notifier, ResultAccessor};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{CycleReport, EngineConfig, ReconcileEngine};
