//! Service layer: the reconcile loop and alert formatting.

pub mod alert;
pub mod reconcile_engine;

pub use alert::{format_failures, AlertMessage, AlertTemplate};
pub use reconcile_engine::{CycleReport, EngineConfig, ReconcileEngine};
