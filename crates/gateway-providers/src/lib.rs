//! Provider Adapter (spec §4.F): a uniform call surface over N upstream AI
//! vendors. Token-usage extraction is defensive — vendors disagree on
//! field names, so [`Usage::normalize`] fills in whatever is missing.

mod anthropic;
mod client;
mod error;
mod mock;
mod openai;
pub mod retry;
mod types;

pub use anthropic::AnthropicClient;
pub use client::ProviderClient;
pub use error::AdapterError;
pub use mock::{MockClient, MockTurn};
pub use openai::OpenAiClient;
pub use types::{
    FinishReason, GenerateOptions, GenerateResult, Message, Role, ToolCall, ToolChoice, ToolDescriptor, Usage,
};
