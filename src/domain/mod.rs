//! Domain layer for flakeguard
//!
//! Pure reconciliation state, models and the port traits the engine talks
//! through. Nothing in here performs I/O.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
