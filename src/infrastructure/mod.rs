//! Infrastructure layer module
//!
//! Configuration loading and logging setup shared by the CLI and the
//! reconcile service.

pub mod config;
pub mod logging;
