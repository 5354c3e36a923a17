use gateway_providers::AdapterError;
use gateway_protocol::{ErrorKind, GatewayError};

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("exactly one of prompt_id or system_prompt must be set")]
    AmbiguousPrompt,
    #[error("unknown provider '{0}'")]
    UnknownProvider(String),
    #[error("no credentials available for provider '{0}'")]
    NoCredentials(String),
    #[error(transparent)]
    Model(#[from] gateway_models::ModelError),
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),
    #[error(transparent)]
    Adapter(#[from] AdapterError),
    #[error("upstream call exceeded its deadline")]
    Timeout,
    #[error(transparent)]
    Ledger(#[from] gateway_ledger::LedgerError),
}

impl From<ExecutorError> for GatewayError {
    fn from(err: ExecutorError) -> Self {
        match &err {
            ExecutorError::AmbiguousPrompt => GatewayError::invalid_params(err.to_string()),
            ExecutorError::UnknownProvider(_) => GatewayError::invalid_params(err.to_string()),
            ExecutorError::NoCredentials(_) => GatewayError::new(ErrorKind::NoCredentials, err.to_string()),
            ExecutorError::Model(gateway_models::ModelError::Restriction(restriction)) => {
                GatewayError::new(ErrorKind::ModelNotAllowed, restriction.to_string())
                    .with_data(serde_json::json!({ "suggestions": restriction.suggestions }))
            }
            ExecutorError::Model(_) => GatewayError::invalid_params(err.to_string()),
            ExecutorError::QuotaExceeded(_) => GatewayError::new(ErrorKind::QuotaExceeded, err.to_string()),
            ExecutorError::Adapter(adapter_err) => adapter_to_gateway(adapter_err),
            ExecutorError::Timeout => GatewayError::new(ErrorKind::UpstreamTimeout, err.to_string()),
            ExecutorError::Ledger(_) => GatewayError::internal("ledger unavailable"),
        }
    }
}

fn adapter_to_gateway(err: &AdapterError) -> GatewayError {
    match err {
        AdapterError::Unauthorized => GatewayError::new(ErrorKind::UpstreamUnauthorized, err.to_string()),
        AdapterError::RateLimited { .. } => GatewayError::new(ErrorKind::UpstreamRateLimited, err.to_string()),
        AdapterError::Timeout => GatewayError::new(ErrorKind::UpstreamTimeout, err.to_string()),
        AdapterError::ForbiddenModel(_) | AdapterError::NotFound(_) | AdapterError::BadRequest(_) => {
            GatewayError::invalid_params(err.to_string())
        }
        AdapterError::Upstream(_) | AdapterError::Transport(_) => {
            GatewayError::new(ErrorKind::UpstreamError, err.to_string())
        }
    }
}
