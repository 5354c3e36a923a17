//! Subcommand implementations, one function per [`crate::cli::Commands`]
//! variant (mirrors the teacher's `commands::{tools_list, tools_call, ...}`
//! one-function-per-subcommand layout).

use crate::error::CliError;
use gateway_server::ServerConfig;
use std::net::SocketAddr;

/// Loads config, builds the app state and binds the listener (spec §6:
/// `port`). Blocks until the process receives a shutdown signal.
pub async fn serve(config_path: Option<&str>) -> Result<(), CliError> {
    let config = ServerConfig::load(config_path)?;
    let port = config.port;

    tracing::info!(port, "building gateway application state");
    let state = gateway_server::build_app_state(config).await?;
    let router = gateway_server::build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "gateway listening");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        if let Ok(mut sig) = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            sig.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    tracing::info!("shutdown signal received");
}

/// Loads and validates configuration without starting the server, then
/// prints it as JSON so an operator can confirm layering (file + env) did
/// what they expected before a deploy.
pub fn config_check(config_path: Option<&str>) -> Result<(), CliError> {
    let config = ServerConfig::load(config_path)?;
    let rendered = serde_json::to_string_pretty(&config).expect("ServerConfig always serializes");
    println!("{rendered}");
    Ok(())
}

/// Runs pending SQL migrations (see `/migrations`) against
/// `token_tracking.database_url`. A no-op deployment with no database
/// configured (pure in-memory ledger/secret store) has nothing to migrate.
pub async fn migrate(config_path: Option<&str>) -> Result<(), CliError> {
    let config = ServerConfig::load(config_path)?;
    let database_url = config
        .token_tracking
        .database_url
        .ok_or(CliError::NoDatabaseUrl)?;

    let pool = sqlx::PgPool::connect(&database_url).await?;
    sqlx::migrate!("../../migrations").run(&pool).await?;
    tracing::info!("migrations applied");
    Ok(())
}
