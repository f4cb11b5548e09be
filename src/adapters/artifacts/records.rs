//! Wire format of the per-run artifact files.

use serde::Deserialize;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::RunResult;

/// `finished.json`, written once a run completes.
#[derive(Debug, Clone, Deserialize)]
pub struct FinishedRecord {
    #[serde(default)]
    pub timestamp: Option<u64>,
    #[serde(default)]
    pub result: Option<String>,
    pub passed: bool,
    #[serde(default)]
    pub metadata: FinishedMetadata,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FinishedMetadata {
    #[serde(default)]
    pub repo: Option<String>,
    #[serde(rename = "repo-commit", default)]
    pub repo_commit: String,
}

/// `started.json`, written when a run is scheduled.
#[derive(Debug, Clone, Deserialize)]
pub struct StartedRecord {
    /// Control-plane identifier of the run, used to request reruns.
    #[serde(default)]
    pub node: String,
    #[serde(default)]
    pub timestamp: Option<u64>,
}

fn malformed(path: &str, reason: impl ToString) -> DomainError {
    DomainError::MalformedArtifact {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

/// Parse `latest-build.txt`.
pub fn parse_latest_build(path: &str, raw: &str) -> DomainResult<u64> {
    raw.trim().parse().map_err(|e| malformed(path, e))
}

/// Parse `finished.json` into a run result.
///
/// A missing `metadata.repo-commit` yields an empty commit: the outcome is
/// still reported, only flake tracking needs the commit.
pub fn parse_finished(path: &str, raw: &str) -> DomainResult<RunResult> {
    let record: FinishedRecord = serde_json::from_str(raw).map_err(|e| malformed(path, e))?;
    Ok(RunResult {
        passed: record.passed,
        commit: record.metadata.repo_commit.trim().to_string(),
    })
}

/// Parse `started.json` and return the run's node identifier.
pub fn parse_started_node(path: &str, raw: &str) -> DomainResult<String> {
    let record: StartedRecord = serde_json::from_str(raw).map_err(|e| malformed(path, e))?;
    let node = record.node.trim();
    if node.is_empty() {
        return Err(malformed(path, "node is missing"));
    }
    Ok(node.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_build_trims_whitespace() {
        assert_eq!(parse_latest_build("job/latest-build.txt", " 42\n").unwrap(), 42);
        assert!(matches!(
            parse_latest_build("job/latest-build.txt", "forty-two"),
            Err(DomainError::MalformedArtifact { .. })
        ));
    }

    #[test]
    fn test_finished_reads_commit_and_outcome() {
        let raw = r#"{
            "timestamp": 1530000000,
            "version": "unknown",
            "result": "FAILURE",
            "passed": false,
            "job-version": "",
            "metadata": {"repo": "istio/istio", "repo-commit": "deadbeef"}
        }"#;
        assert_eq!(
            parse_finished("job/7/finished.json", raw).unwrap(),
            RunResult::failed("deadbeef")
        );
    }

    #[test]
    fn test_finished_without_commit_keeps_outcome() {
        let raw = r#"{"passed": false, "metadata": {}}"#;
        assert_eq!(parse_finished("job/7/finished.json", raw).unwrap(), RunResult::failed(""));
        assert_eq!(
            parse_finished("job/8/finished.json", r#"{"passed": true}"#).unwrap(),
            RunResult::passed("")
        );
    }

    #[test]
    fn test_finished_without_passed_is_malformed() {
        let err = parse_finished("job/7/finished.json", r#"{"metadata": {}}"#).unwrap_err();
        assert!(matches!(err, DomainError::MalformedArtifact { .. }));
    }

    #[test]
    fn test_started_node() {
        let raw = r#"{"node": "7d2c1f0e-1111", "timestamp": 1530000000}"#;
        assert_eq!(parse_started_node("job/7/started.json", raw).unwrap(), "7d2c1f0e-1111");
        assert!(parse_started_node("job/7/started.json", "{}").is_err());
    }
}
