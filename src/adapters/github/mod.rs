//! GitHub integrations.

pub mod branch_guard;

pub use branch_guard::GitHubBranchGuard;
