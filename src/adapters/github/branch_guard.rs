//! Branch guard driving GitHub branch protection.
//!
//! Merges are blocked by adding a required status check that no CI ever
//! reports, and unblocked by removing it again. Both operations read the
//! current contexts first so they are no-ops when nothing has to change.
//!
//! Only the context list is edited: the branch must already have
//! required-status-checks protection. Without it GitHub answers 404, which
//! fails `block` and leaves `unblock` with nothing to do.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use std::time::Duration;
use tracing::{debug, info};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{BranchGuardConfig, ProtectedBranch};
use crate::domain::ports::BranchGuard;

/// HTTP client for the branch protection endpoints of the GitHub REST API v3.
#[derive(Debug, Clone)]
pub struct GitHubBranchGuard {
    http: Client,
    api_url: String,
    token: String,
    block_context: String,
}

impl GitHubBranchGuard {
    pub fn new(
        api_url: impl Into<String>,
        token: impl Into<String>,
        block_context: impl Into<String>,
    ) -> DomainResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DomainError::ValidationFailed(format!("HTTP client setup failed: {e}")))?;

        Ok(Self {
            http,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            block_context: block_context.into(),
        })
    }

    /// Build a guard from configuration, reading the token from
    /// `token_file` or else from the `token_env` variable.
    pub fn from_config(config: &BranchGuardConfig) -> DomainResult<Self> {
        let token = match &config.token_file {
            Some(path) => std::fs::read_to_string(path).map_err(|e| {
                DomainError::ValidationFailed(format!("cannot read GitHub token file {path}: {e}"))
            })?,
            None => std::env::var(&config.token_env).map_err(|_| {
                DomainError::ValidationFailed(format!(
                    "{} environment variable is not set",
                    config.token_env
                ))
            })?,
        };
        let token = token.trim();
        if token.is_empty() {
            return Err(DomainError::ValidationFailed("GitHub token is empty".to_string()));
        }

        Self::new(&config.api_url, token, &config.block_context)
    }

    fn contexts_url(&self, target: &ProtectedBranch) -> String {
        format!(
            "{}/repos/{}/{}/branches/{}/protection/required_status_checks/contexts",
            self.api_url, target.owner, target.repo, target.branch
        )
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .header("User-Agent", "flakeguard")
    }

    fn failure(target: &ProtectedBranch, reason: String) -> DomainError {
        DomainError::BranchGuardFailed {
            target: target.to_string(),
            reason,
        }
    }

    async fn send(&self, target: &ProtectedBranch, req: RequestBuilder, action: &str) -> DomainResult<reqwest::Response> {
        let resp = req
            .send()
            .await
            .map_err(|e| Self::failure(target, format!("{action} request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Self::failure(target, format!("{action} returned {status}: {body}")));
        }
        Ok(resp)
    }

    /// Required status-check contexts currently set on the branch, or
    /// `Err(body)` of the 404 when the branch has no such protection.
    pub async fn contexts(&self, target: &ProtectedBranch) -> DomainResult<Result<Vec<String>, String>> {
        let url = self.contexts_url(target);
        let resp = self
            .request(Method::GET, &url)
            .send()
            .await
            .map_err(|e| Self::failure(target, format!("list contexts request failed: {e}")))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(Err(resp.text().await.unwrap_or_default()));
        }
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Self::failure(target, format!("list contexts returned {status}: {body}")));
        }
        resp.json::<Vec<String>>()
            .await
            .map(Ok)
            .map_err(|e| Self::failure(target, format!("list contexts parse failed: {e}")))
    }
}

#[async_trait]
impl BranchGuard for GitHubBranchGuard {
    async fn block(&self, target: &ProtectedBranch) -> DomainResult<()> {
        let contexts = self.contexts(target).await?.map_err(|body| {
            Self::failure(
                target,
                format!("required status checks protection must exist before merges can be blocked: {body}"),
            )
        })?;
        if contexts.contains(&self.block_context) {
            debug!(branch = %target, "merges already blocked");
            return Ok(());
        }

        let url = self.contexts_url(target);
        let req = self.request(Method::POST, &url).json(&[&self.block_context]);
        self.send(target, req, "add context").await?;
        info!(branch = %target, context = %self.block_context, "blocked merges");
        Ok(())
    }

    async fn unblock(&self, target: &ProtectedBranch) -> DomainResult<()> {
        let blocked = match self.contexts(target).await? {
            Ok(contexts) => contexts.contains(&self.block_context),
            Err(_) => {
                debug!(branch = %target, "no required status checks protection, nothing to unblock");
                return Ok(());
            }
        };
        if !blocked {
            debug!(branch = %target, "merges not blocked");
            return Ok(());
        }

        let url = self.contexts_url(target);
        let req = self.request(Method::DELETE, &url).json(&[&self.block_context]);
        self.send(target, req, "remove context").await?;
        info!(branch = %target, context = %self.block_context, "unblocked merges");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contexts_url() {
        let guard = GitHubBranchGuard::new("https://api.github.com/", "t", "blocked").unwrap();
        assert_eq!(
            guard.contexts_url(&ProtectedBranch::new("istio", "istio", "master")),
            "https://api.github.com/repos/istio/istio/branches/master/protection/required_status_checks/contexts"
        );
    }

    #[test]
    fn test_from_config_reads_token_env() {
        let config = BranchGuardConfig {
            token_env: "FLAKEGUARD_TEST_GH_TOKEN".to_string(),
            ..BranchGuardConfig::default()
        };
        temp_env::with_var("FLAKEGUARD_TEST_GH_TOKEN", Some(" secret\n"), || {
            let guard = GitHubBranchGuard::from_config(&config).unwrap();
            assert_eq!(guard.token, "secret");
        });
        temp_env::with_var_unset("FLAKEGUARD_TEST_GH_TOKEN", || {
            assert!(GitHubBranchGuard::from_config(&config).is_err());
        });
    }
}
