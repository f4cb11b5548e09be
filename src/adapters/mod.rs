//! Infrastructure adapters for external systems.

pub mod artifacts;
pub mod fakes;
pub mod flake_log;
pub mod github;
pub mod notify;
pub mod rerun;
pub mod sqlite;

pub use flake_log::LogFlakeStore;
