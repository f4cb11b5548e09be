//! Flakeguard CLI entry point.

use clap::Parser;

use flakeguard::cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    let result = match cli.command {
        Commands::Run(args) => flakeguard::cli::commands::run::execute(args, config_path, cli.json).await,
        Commands::Flakes(args) => {
            flakeguard::cli::commands::flakes::execute(args, config_path, cli.json).await
        }
        Commands::Config(args) => flakeguard::cli::commands::config::execute(args, config_path, cli.json),
    };

    if let Err(err) = result {
        flakeguard::cli::handle_error(err, cli.json);
    }
}
