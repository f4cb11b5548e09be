//! Port trait definitions (Hexagonal Architecture)
//!
//! Async trait interfaces the reconcile engine and the artifact accessor talk
//! through:
//! - ResultAccessor: latest run, run results and reruns of CI jobs
//! - ObjectStore: read-only artifact bucket behind the accessor
//! - RerunLauncher: control-plane command that starts one rerun
//! - FlakeStore: durable sink for completed flake campaigns
//! - Notifier: alert delivery
//! - BranchGuard: merge blocking on protected branches

pub mod branch_guard;
pub mod flake_store;
pub mod notifier;
pub mod object_store;
pub mod rerun_launcher;
pub mod result_accessor;

pub use branch_guard::BranchGuard;
pub use flake_store::FlakeStore;
pub use notifier::Notifier;
pub use object_store::ObjectStore;
pub use rerun_launcher::RerunLauncher;
pub use result_accessor::ResultAccessor;
