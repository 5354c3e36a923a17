//! Remote tool-server manager (spec §4.I): owns external tool-server
//! processes/connections behind one uniform interface. Clients never hold
//! a reference to the underlying connection — only the manager's
//! `list_tools`/`invoke` surface.

mod manager;
pub mod transport;

pub use manager::{ManagedServerStatus, RemoteToolServerManager, ServerState, ToolServerSpec};
pub use transport::{ContainerTransport, HttpSseTransport, StdioChildTransport, ToolServerError, ToolServerTransport};

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub input_schema: Value,
}
