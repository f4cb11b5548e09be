//! `flakeguard flakes`: read back stored flake statistics.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use comfy_table::Cell;
use std::path::Path;

use crate::adapters::sqlite::{initialize_database, SqliteFlakeStore};
use crate::cli::output::{list_table, output, render_list, CommandOutput};
use crate::domain::models::FlakeRecord;

#[derive(Args, Debug)]
pub struct FlakesArgs {
    #[command(subcommand)]
    pub command: FlakesCommands,
}

#[derive(Subcommand, Debug)]
pub enum FlakesCommands {
    /// List the most recent completed rerun campaigns
    List {
        /// Only show records of this job
        #[arg(long)]
        job: Option<String>,

        /// Maximum number of records to display
        #[arg(short, long, default_value = "20")]
        limit: u32,
    },
}

pub async fn execute(args: FlakesArgs, config_path: Option<&Path>, json: bool) -> Result<()> {
    let config = crate::cli::load_config(config_path)?;
    let database_url = config.flake_store.database_url.trim();
    if database_url.is_empty() {
        anyhow::bail!("Flake persistence is disabled (`flake_store.database_url` is empty)");
    }

    let pool = initialize_database(database_url)
        .await
        .context("Failed to open the flake database")?;
    let store = SqliteFlakeStore::new(pool);

    match args.command {
        FlakesCommands::List { job, limit } => {
            let records = store.list_recent(job.as_deref(), limit).await?;
            output(&FlakeListOutput::new(records), json);
        }
    }
    Ok(())
}

#[derive(Debug, serde::Serialize)]
pub struct FlakeListOutput {
    pub records: Vec<FlakeRecord>,
    pub total: usize,
}

impl FlakeListOutput {
    pub fn new(records: Vec<FlakeRecord>) -> Self {
        let total = records.len();
        Self { records, total }
    }
}

impl CommandOutput for FlakeListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["recorded", "job", "commit", "reruns", "failures", "rate"]);
        for record in &self.records {
            let stat = &record.stat;
            let commit: String = stat.commit.chars().take(12).collect();
            table.add_row(vec![
                Cell::new(record.recorded_at.format("%Y-%m-%d %H:%M")),
                Cell::new(&stat.job),
                Cell::new(commit),
                Cell::new(stat.total_reruns),
                Cell::new(stat.failures),
                Cell::new(format!("{:.0}%", stat.failure_rate() * 100.0)),
            ]);
        }
        render_list("flake record", &table, self.total)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::FlakeStat;

    #[test]
    fn test_human_output_shows_rate() {
        let output = FlakeListOutput::new(vec![FlakeRecord::new(FlakeStat {
            job: "e2e".to_string(),
            commit: "0123456789abcdef".to_string(),
            total_reruns: 4,
            failures: 1,
        })]);
        let human = output.to_human();
        assert!(human.contains("e2e"));
        assert!(human.contains("0123456789ab"));
        assert!(!human.contains("0123456789abc"));
        assert!(human.contains("25%"));
    }

    #[test]
    fn test_json_output_flattens_stat() {
        let output = FlakeListOutput::new(vec![FlakeRecord::new(FlakeStat {
            job: "e2e".to_string(),
            commit: "abc".to_string(),
            total_reruns: 2,
            failures: 2,
        })]);
        let json = output.to_json();
        assert_eq!(json["total"], 1);
        assert_eq!(json["records"][0]["job"], "e2e");
        assert_eq!(json["records"][0]["failures"], 2);
    }
}
