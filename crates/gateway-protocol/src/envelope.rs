//! Envelope protocol: `{version:"2.0", id, method, params}` request/response
//! pair shared by the line-oriented front door.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::ErrorKind;

/// Envelope protocol version string. The core does not support batching.
pub const ENVELOPE_VERSION: &str = "2.0";

/// Request/response correlation id. Accepts either a number or a string,
/// matching what most RPC clients already send.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
        }
    }
}

/// Response id, which may be null for requests that never decoded enough to
/// discover a `RequestId` (parse errors).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResponseId(pub Option<RequestId>);

impl ResponseId {
    pub fn from_request(id: RequestId) -> Self {
        Self(Some(id))
    }

    pub fn null() -> Self {
        Self(None)
    }
}

/// Incoming envelope request: `{version, id, method, params}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeRequest {
    pub version: String,
    pub id: RequestId,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// Envelope response payload: result XOR error, never both.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnvelopeResponsePayload {
    Success { result: Value },
    Error { error: EnvelopeError },
}

/// Outgoing envelope response: always HTTP 200 except for parse failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeResponse {
    pub id: ResponseId,
    #[serde(flatten)]
    pub payload: EnvelopeResponsePayload,
}

impl EnvelopeResponse {
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            id: ResponseId::from_request(id),
            payload: EnvelopeResponsePayload::Success { result },
        }
    }

    pub fn error(id: ResponseId, error: EnvelopeError) -> Self {
        Self {
            id,
            payload: EnvelopeResponsePayload::Error { error },
        }
    }
}

/// Envelope error object: `{code, message, data?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl EnvelopeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            code: kind.envelope_code(),
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_accepts_number_or_string() {
        let numeric: RequestId = serde_json::from_value(serde_json::json!(1)).unwrap();
        let stringy: RequestId = serde_json::from_value(serde_json::json!("abc")).unwrap();
        assert_eq!(numeric, RequestId::Number(1));
        assert_eq!(stringy, RequestId::String("abc".into()));
    }

    #[test]
    fn response_round_trips_success() {
        let resp = EnvelopeResponse::success(RequestId::Number(1), serde_json::json!({"ok": true}));
        let encoded = serde_json::to_value(&resp).unwrap();
        assert_eq!(encoded["id"], serde_json::json!(1));
        assert_eq!(encoded["result"]["ok"], serde_json::json!(true));
        assert!(encoded.get("error").is_none());
    }

    #[test]
    fn response_round_trips_error() {
        let err = EnvelopeError::new(ErrorKind::MethodNotFound, "no such method");
        let resp = EnvelopeResponse::error(ResponseId::from_request(RequestId::Number(2)), err);
        let encoded = serde_json::to_value(&resp).unwrap();
        assert_eq!(encoded["error"]["code"], serde_json::json!(-32601));
        assert!(encoded.get("result").is_none());
    }

    #[test]
    fn parse_error_uses_null_id() {
        let err = EnvelopeError::new(ErrorKind::Parse, "invalid json");
        let resp = EnvelopeResponse::error(ResponseId::null(), err);
        let encoded = serde_json::to_value(&resp).unwrap();
        assert_eq!(encoded["id"], serde_json::Value::Null);
    }
}
