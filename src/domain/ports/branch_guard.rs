//! Branch guard port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::ProtectedBranch;

/// Suspends and resumes merging into a protected branch.
///
/// Both operations must be idempotent: the engine calls one of them every
/// cycle whether or not anything changed.
#[async_trait]
pub trait BranchGuard: Send + Sync {
    async fn block(&self, target: &ProtectedBranch) -> DomainResult<()>;

    async fn unblock(&self, target: &ProtectedBranch) -> DomainResult<()>;
}
