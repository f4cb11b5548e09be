//! `flakeguard config`: show or validate the effective configuration.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use std::path::Path;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;
use crate::infrastructure::config::loader::DEFAULT_CONFIG_FILE;
use crate::infrastructure::config::ConfigLoader;

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the merged configuration (defaults, files and environment)
    Show,
    /// Check the configuration and report the first problem found
    Validate,
}

pub fn execute(args: ConfigArgs, config_path: Option<&Path>, json: bool) -> Result<()> {
    let path = config_path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
    let config: Config = ConfigLoader::figment(path)
        .extract()
        .with_context(|| format!("Failed to load config from {}", path.display()))?;

    match args.command {
        ConfigCommands::Show => output(&ConfigShowOutput { config }, json),
        ConfigCommands::Validate => {
            ConfigLoader::validate(&config)?;
            output(
                &ConfigValidOutput {
                    valid: true,
                    jobs: config.jobs.len(),
                },
                json,
            );
        }
    }
    Ok(())
}

#[derive(Debug, serde::Serialize)]
pub struct ConfigShowOutput {
    #[serde(flatten)]
    pub config: Config,
}

impl CommandOutput for ConfigShowOutput {
    fn to_human(&self) -> String {
        serde_yaml::to_string(&self.config).unwrap_or_default()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.config).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct ConfigValidOutput {
    pub valid: bool,
    pub jobs: usize,
}

impl CommandOutput for ConfigValidOutput {
    fn to_human(&self) -> String {
        format!("Configuration is valid ({} job(s) watched).", self.jobs)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}
