//! In-process adapter double used by `gateway-executor`'s tests (spec §4.F:
//! "enough to exercise every normalization and retry path without vendor
//! credentials").

use crate::client::ProviderClient;
use crate::{AdapterError, FinishReason, GenerateOptions, GenerateResult, Message, ToolCall, Usage};
use async_trait::async_trait;
use gateway_models::ModelDescriptor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub enum MockTurn {
    Text(String),
    ToolCall { id: String, name: String, arguments: serde_json::Value },
    Fail(AdapterError),
}

/// Replays a scripted sequence of turns, one per call to `generate`, so
/// tests can drive a tool loop deterministically.
pub struct MockClient {
    provider: &'static str,
    turns: Mutex<Vec<MockTurn>>,
    calls: AtomicUsize,
}

impl MockClient {
    pub fn new(provider: &'static str, turns: Vec<MockTurn>) -> Self {
        Self {
            provider,
            turns: Mutex::new(turns),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderClient for MockClient {
    fn provider_name(&self) -> &'static str {
        self.provider
    }

    async fn generate(
        &self,
        _api_key: &str,
        _model: &ModelDescriptor,
        _messages: &[Message],
        _opts: &GenerateOptions,
    ) -> Result<GenerateResult, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let turn = {
            let mut turns = self.turns.lock().unwrap();
            if turns.is_empty() {
                return Err(AdapterError::Upstream("mock exhausted".into()));
            }
            turns.remove(0)
        };

        match turn {
            MockTurn::Text(text) => Ok(GenerateResult {
                text,
                usage: Usage::normalize(Some(10), Some(5), None),
                finish_reason: FinishReason::Stop,
                tool_calls: vec![],
            }),
            MockTurn::ToolCall { id, name, arguments } => Ok(GenerateResult {
                text: String::new(),
                usage: Usage::normalize(Some(10), Some(5), None),
                finish_reason: FinishReason::ToolCalls,
                tool_calls: vec![ToolCall { id, name, arguments }],
            }),
            MockTurn::Fail(err) => Err(err),
        }
    }
}
