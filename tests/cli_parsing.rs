use clap::Parser;
use flakeguard::cli::commands::config::ConfigCommands;
use flakeguard::cli::commands::flakes::FlakesCommands;
use flakeguard::cli::{Cli, Commands};
use std::path::PathBuf;

#[test]
fn test_parse_run_once() {
    let cli = Cli::try_parse_from(["flakeguard", "run", "--once"]).unwrap();
    match cli.command {
        Commands::Run(args) => assert!(args.once),
        _ => panic!("Wrong top-level command"),
    }
    assert!(!cli.json);
}

#[test]
fn test_parse_run_defaults_to_loop() {
    let cli = Cli::try_parse_from(["flakeguard", "run"]).unwrap();
    match cli.command {
        Commands::Run(args) => assert!(!args.once),
        _ => panic!("Wrong top-level command"),
    }
}

#[test]
fn test_parse_flakes_list() {
    let cli = Cli::try_parse_from(["flakeguard", "flakes", "list", "--job", "e2e", "--limit", "5"]).unwrap();
    match cli.command {
        Commands::Flakes(args) => match args.command {
            FlakesCommands::List { job, limit } => {
                assert_eq!(job.as_deref(), Some("e2e"));
                assert_eq!(limit, 5);
            }
        },
        _ => panic!("Wrong top-level command"),
    }
}

#[test]
fn test_parse_flakes_list_default_limit() {
    let cli = Cli::try_parse_from(["flakeguard", "flakes", "list"]).unwrap();
    match cli.command {
        Commands::Flakes(args) => match args.command {
            FlakesCommands::List { job, limit } => {
                assert!(job.is_none());
                assert_eq!(limit, 20);
            }
        },
        _ => panic!("Wrong top-level command"),
    }
}

#[test]
fn test_global_flags_after_subcommand() {
    let cli = Cli::try_parse_from([
        "flakeguard",
        "config",
        "validate",
        "--json",
        "--config",
        "ci/flakeguard.yaml",
    ])
    .unwrap();
    assert!(cli.json);
    assert_eq!(cli.config, Some(PathBuf::from("ci/flakeguard.yaml")));
    match cli.command {
        Commands::Config(args) => assert!(matches!(args.command, ConfigCommands::Validate)),
        _ => panic!("Wrong top-level command"),
    }
}

#[test]
fn test_unknown_subcommand_is_rejected() {
    assert!(Cli::try_parse_from(["flakeguard", "deploy", "now"]).is_err());
}

#[test]
fn test_cli_definition_is_consistent() {
    use clap::CommandFactory;
    Cli::command().debug_assert();
}
