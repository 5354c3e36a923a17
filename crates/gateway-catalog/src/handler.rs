//! The handler trait every registered procedure implements.

use gateway_protocol::{GatewayError, Principal};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;

pub type HandlerResult = Result<Value, GatewayError>;
pub type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send + 'static>>;

/// A procedure's business logic: `(principal, params) -> result`, matching
/// the catalog's registration contract exactly. Implemented either by hand (for
/// complex procedures) or via [`fn_handler`] for a plain async closure.
pub trait ProcedureHandler: Send + Sync + 'static {
    fn call(&self, principal: Principal, params: Value) -> HandlerFuture;
}

impl<F, Fut> ProcedureHandler for F
where
    F: Fn(Principal, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, principal: Principal, params: Value) -> HandlerFuture {
        Box::pin(self(principal, params))
    }
}
