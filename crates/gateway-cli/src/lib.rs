//! Process entrypoint for the AI request gateway: `serve` builds the
//! [`gateway_server::AppState`] and binds the HTTP listener, `config-check`
//! validates the layered configuration, `migrate` applies the ledger and
//! secret-store schema (spec §9: "Shared mutable process-wide state ...
//! becomes explicit components with defined lifecycles owned by a
//! top-level server object").

pub mod cli;
pub mod commands;
pub mod error;

use clap::Parser;
use cli::{Cli, Commands};
use error::CliError;
use tracing_subscriber::EnvFilter;

/// Initializes the global tracing subscriber from `RUST_LOG`, defaulting to
/// `info`. Called once from `main`; panics if a subscriber is already set,
/// which can only happen if a caller installs its own first.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

/// Parses argv and dispatches to the selected subcommand.
pub async fn run() -> Result<(), CliError> {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Serve => commands::serve(config_path).await,
        Commands::ConfigCheck => commands::config_check(config_path),
        Commands::Migrate => commands::migrate(config_path).await,
    }
}
