//! CLI command implementations.

pub mod config;
pub mod flakes;
pub mod run;
