//! CLI argument parsing (spec §9: process entrypoint for serve / config
//! check / migrate, mirroring the teacher's `clap`-derived `Cli` struct).

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "gateway",
    version,
    about = "AI request gateway: dual-protocol front door, auth, model routing and billing"
)]
pub struct Cli {
    /// Path to a TOML config file (overridden by `GATEWAY__`-prefixed env vars)
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP front door and block until shutdown
    Serve,
    /// Load and validate configuration, then print it as JSON
    ConfigCheck,
    /// Run pending database migrations against `token_tracking.database_url`
    Migrate,
}
