//! SQLite implementation of the FlakeStore.

use async_trait::async_trait;
use sqlx::SqlitePool;

use super::{parse_datetime, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{FlakeRecord, FlakeStat};
use crate::domain::ports::FlakeStore;

pub struct SqliteFlakeStore {
    pool: SqlitePool,
}

impl SqliteFlakeStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Most recent records first, optionally for a single job.
    pub async fn list_recent(&self, job: Option<&str>, limit: u32) -> DomainResult<Vec<FlakeRecord>> {
        let rows: Vec<FlakeRow> = sqlx::query_as(
            r#"SELECT id, job, commit_sha, total_reruns, failures, recorded_at
               FROM flake_records
               WHERE (?1 IS NULL OR job = ?1)
               ORDER BY recorded_at DESC, rowid DESC
               LIMIT ?2"#
        )
        .bind(job)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(FlakeRecord::try_from).collect()
    }
}

#[async_trait]
impl FlakeStore for SqliteFlakeStore {
    async fn store(&self, job: &str, commit: &str, stat: &FlakeStat) -> DomainResult<()> {
        let record = FlakeRecord::new(FlakeStat {
            job: job.to_string(),
            commit: commit.to_string(),
            ..stat.clone()
        });

        sqlx::query(
            r#"INSERT INTO flake_records (id, job, commit_sha, total_reruns, failures, recorded_at)
               VALUES (?, ?, ?, ?, ?, ?)"#
        )
        .bind(record.id.to_string())
        .bind(&record.stat.job)
        .bind(&record.stat.commit)
        .bind(i64::from(record.stat.total_reruns))
        .bind(i64::from(record.stat.failures))
        .bind(record.recorded_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct FlakeRow {
    id: String,
    job: String,
    commit_sha: String,
    total_reruns: i64,
    failures: i64,
    recorded_at: String,
}

fn parse_count(value: i64, column: &str) -> DomainResult<u32> {
    u32::try_from(value)
        .map_err(|_| DomainError::SerializationError(format!("{column} out of range: {value}")))
}

impl TryFrom<FlakeRow> for FlakeRecord {
    type Error = DomainError;

    fn try_from(row: FlakeRow) -> Result<Self, Self::Error> {
        Ok(FlakeRecord {
            id: parse_uuid(&row.id)?,
            stat: FlakeStat {
                job: row.job,
                commit: row.commit_sha,
                total_reruns: parse_count(row.total_reruns, "total_reruns")?,
                failures: parse_count(row.failures, "failures")?,
            },
            recorded_at: parse_datetime(&row.recorded_at)?,
        })
    }
}
