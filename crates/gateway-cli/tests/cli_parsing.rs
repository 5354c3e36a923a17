//! Argument-parsing tests for the `gateway` binary's subcommands.

use clap::Parser;
use gateway_cli::cli::{Cli, Commands};

#[test]
fn parses_serve_with_config_flag() {
    let cli = Cli::parse_from(["gateway", "--config", "gateway.toml", "serve"]);
    assert_eq!(cli.config.as_deref(), Some("gateway.toml"));
    assert!(matches!(cli.command, Commands::Serve));
}

#[test]
fn parses_config_check_without_config_flag() {
    let cli = Cli::parse_from(["gateway", "config-check"]);
    assert_eq!(cli.config, None);
    assert!(matches!(cli.command, Commands::ConfigCheck));
}

#[test]
fn parses_migrate() {
    let cli = Cli::parse_from(["gateway", "migrate"]);
    assert!(matches!(cli.command, Commands::Migrate));
}

#[test]
fn rejects_unknown_subcommand() {
    let result = Cli::try_parse_from(["gateway", "bogus"]);
    assert!(result.is_err());
}
