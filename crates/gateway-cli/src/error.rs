use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("server bootstrap failed: {0}")]
    Bootstrap(#[from] gateway_server::BootstrapError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("token_tracking.database_url is not set; nothing to migrate")]
    NoDatabaseUrl,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
