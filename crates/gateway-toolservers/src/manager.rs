use crate::transport::{ToolServerError, ToolServerTransport};
use crate::ToolDescriptor;
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};

/// `{starting, ready, failed, stopped}` per spec §3 `RemoteToolServer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerState {
    Starting,
    Ready,
    Failed,
    Stopped,
}

#[derive(Debug, Clone, Serialize)]
pub struct ManagedServerStatus {
    pub name: String,
    pub state: ServerState,
    pub tools: Vec<ToolDescriptor>,
    pub last_error: Option<String>,
}

pub struct ToolServerSpec {
    pub name: String,
    pub transport: Box<dyn ToolServerTransport>,
    /// Additional `initialize()` attempts after the first failure, with
    /// `startup_delay_ms` between attempts (spec §4.I: "configurable retry
    /// and back-off").
    pub startup_retries: u32,
    pub startup_delay_ms: u64,
}

impl ToolServerSpec {
    pub fn new(name: impl Into<String>, transport: Box<dyn ToolServerTransport>) -> Self {
        Self {
            name: name.into(),
            transport,
            startup_retries: 0,
            startup_delay_ms: 0,
        }
    }

    pub fn with_startup_retry(mut self, retries: u32, delay_ms: u64) -> Self {
        self.startup_retries = retries;
        self.startup_delay_ms = delay_ms;
        self
    }
}

enum Command {
    Invoke {
        tool: String,
        args: Value,
        respond: oneshot::Sender<Result<Value, ToolServerError>>,
    },
    Shutdown,
}

struct Entry {
    sender: mpsc::Sender<Command>,
    status: Arc<Mutex<ManagedServerStatus>>,
}

/// Owns every external tool server. Each gets a dedicated `tokio::task`
/// plus a single request queue (spec §5: "the manager never shares a
/// connection across requests without a demux"); callers only ever see
/// [`list_tools`](Self::list_tools) / [`invoke`](Self::invoke).
pub struct RemoteToolServerManager {
    servers: DashMap<String, Entry>,
    prefix_tool_names: bool,
}

impl RemoteToolServerManager {
    pub fn new(prefix_tool_names: bool) -> Self {
        Self {
            servers: DashMap::new(),
            prefix_tool_names,
        }
    }

    /// Spawns the server's dedicated task: `spawn -> initialize -> ready`.
    /// A handshake failure leaves the entry `Failed` with `last_error` set
    /// rather than returning an error to the caller — per spec §4.I,
    /// "the server still starts; failed tool-servers appear in status ...
    /// but do not block traffic".
    pub async fn add_server(&self, spec: ToolServerSpec) {
        let name = spec.name.clone();
        let status = Arc::new(Mutex::new(ManagedServerStatus {
            name: name.clone(),
            state: ServerState::Starting,
            tools: Vec::new(),
            last_error: None,
        }));
        let (tx, rx) = mpsc::channel(32);
        self.servers.insert(
            name.clone(),
            Entry {
                sender: tx,
                status: status.clone(),
            },
        );

        tokio::spawn(run_server_task(
            spec.transport,
            status,
            rx,
            spec.startup_retries,
            spec.startup_delay_ms,
        ));
    }

    pub async fn status(&self, name: &str) -> Option<ManagedServerStatus> {
        let entry = self.servers.get(name)?;
        Some(entry.status.lock().await.clone())
    }

    pub async fn all_status(&self) -> Vec<ManagedServerStatus> {
        let mut out = Vec::new();
        for entry in self.servers.iter() {
            out.push(entry.status.lock().await.clone());
        }
        out
    }

    /// `(server, tool)` pairs across every `Ready` server, with names
    /// prefixed `<server>__<tool>` when configured to disambiguate across
    /// servers.
    pub async fn list_tools(&self) -> Vec<(String, ToolDescriptor)> {
        let mut out = Vec::new();
        for entry in self.servers.iter() {
            let status = entry.status.lock().await;
            if status.state != ServerState::Ready {
                continue;
            }
            for tool in &status.tools {
                let exposed_name = if self.prefix_tool_names {
                    format!("{}__{}", status.name, tool.name)
                } else {
                    tool.name.clone()
                };
                out.push((
                    status.name.clone(),
                    ToolDescriptor {
                        name: exposed_name,
                        description: tool.description.clone(),
                        input_schema: tool.input_schema.clone(),
                    },
                ));
            }
        }
        out
    }

    pub async fn invoke(
        &self,
        server: &str,
        tool: &str,
        args: Value,
    ) -> Result<Value, ToolServerError> {
        let entry = self
            .servers
            .get(server)
            .ok_or_else(|| ToolServerError::Io(format!("unknown tool server '{server}'")))?;
        let (tx, rx) = oneshot::channel();
        entry
            .sender
            .send(Command::Invoke {
                tool: tool.to_string(),
                args,
                respond: tx,
            })
            .await
            .map_err(|_| ToolServerError::ProcessExited)?;
        rx.await.map_err(|_| ToolServerError::ProcessExited)?
    }

    /// Sends every server a stop signal and gives it a grace period before
    /// the task's own `shutdown()` kills the underlying process.
    pub async fn shutdown_all(&self) {
        for entry in self.servers.iter() {
            let _ = entry.sender.send(Command::Shutdown).await;
        }
    }
}

async fn run_server_task(
    mut transport: Box<dyn ToolServerTransport>,
    status: Arc<Mutex<ManagedServerStatus>>,
    mut rx: mpsc::Receiver<Command>,
    startup_retries: u32,
    startup_delay_ms: u64,
) {
    let mut last_err = None;
    let mut attempt = 0;
    let init_result = loop {
        match transport.initialize().await {
            Ok(tools) => break Ok(tools),
            Err(e) => {
                last_err = Some(e);
                if attempt >= startup_retries {
                    break Err(last_err.unwrap());
                }
                attempt += 1;
                tracing::warn!(attempt, "tool server initialize failed; retrying after backoff");
                tokio::time::sleep(tokio::time::Duration::from_millis(startup_delay_ms)).await;
            }
        }
    };

    match init_result {
        Ok(tools) => {
            let mut guard = status.lock().await;
            guard.state = ServerState::Ready;
            guard.tools = tools;
        }
        Err(e) => {
            tracing::warn!(error = %e, "tool server failed to initialize");
            let mut guard = status.lock().await;
            guard.state = ServerState::Failed;
            guard.last_error = Some(e.to_string());
            // Startup failure does not block traffic: the task keeps
            // listening (an operator may still query status / shut it
            // down) but every invoke fails fast.
        }
    }

    while let Some(command) = rx.recv().await {
        match command {
            Command::Invoke { tool, args, respond } => {
                let is_failed = status.lock().await.state == ServerState::Failed;
                if is_failed {
                    let _ = respond.send(Err(ToolServerError::RemoteError(
                        "tool server is not ready".into(),
                    )));
                    continue;
                }

                let mut result = transport.invoke(&tool, args.clone()).await;
                if result.is_err() && transport.is_idempotent() {
                    // Single reconnect+retry for idempotent transports
                    // only (spec §4.I).
                    result = transport.invoke(&tool, args).await;
                }

                if let Err(ref e) = result {
                    tracing::warn!(error = %e, "tool invocation failed after readiness");
                    let mut guard = status.lock().await;
                    guard.last_error = Some(e.to_string());
                }
                let _ = respond.send(result);
            }
            Command::Shutdown => {
                transport.shutdown().await;
                let mut guard = status.lock().await;
                guard.state = ServerState::Stopped;
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockTransport {
        fail_init: bool,
        invoke_calls: Arc<AtomicUsize>,
        idempotent: bool,
    }

    #[async_trait]
    impl ToolServerTransport for MockTransport {
        async fn initialize(&mut self) -> Result<Vec<ToolDescriptor>, ToolServerError> {
            if self.fail_init {
                return Err(ToolServerError::ProcessExited);
            }
            Ok(vec![ToolDescriptor {
                name: "search".into(),
                description: "search the web".into(),
                input_schema: serde_json::json!({"type":"object"}),
            }])
        }

        async fn invoke(&mut self, _tool: &str, _args: Value) -> Result<Value, ToolServerError> {
            let n = self.invoke_calls.fetch_add(1, Ordering::SeqCst);
            if n == 0 && self.idempotent {
                // first attempt fails; the retry (second attempt) succeeds
                return Err(ToolServerError::Http("transient".into()));
            }
            Ok(serde_json::json!({"ok": true}))
        }

        async fn shutdown(&mut self) {}

        fn is_idempotent(&self) -> bool {
            self.idempotent
        }
    }

    #[tokio::test]
    async fn ready_server_lists_its_tools_unprefixed() {
        let manager = RemoteToolServerManager::new(false);
        manager
            .add_server(ToolServerSpec::new("search-server".into(), Box::new(MockTransport {
                    fail_init: false,
                    invoke_calls: Arc::new(AtomicUsize::new(0)),
                    idempotent: false,
                })))
            .await;

        // allow the spawned task to run its initialize handshake
        tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
        let tools = manager.list_tools().await;
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].1.name, "search");
    }

    #[tokio::test]
    async fn prefix_tool_names_disambiguates_across_servers() {
        let manager = RemoteToolServerManager::new(true);
        manager
            .add_server(ToolServerSpec::new("search-server".into(), Box::new(MockTransport {
                    fail_init: false,
                    invoke_calls: Arc::new(AtomicUsize::new(0)),
                    idempotent: false,
                })))
            .await;
        tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
        let tools = manager.list_tools().await;
        assert_eq!(tools[0].1.name, "search-server__search");
    }

    #[tokio::test]
    async fn failed_startup_does_not_block_traffic() {
        let manager = RemoteToolServerManager::new(false);
        manager
            .add_server(ToolServerSpec::new("broken".into(), Box::new(MockTransport {
                    fail_init: true,
                    invoke_calls: Arc::new(AtomicUsize::new(0)),
                    idempotent: false,
                })))
            .await;
        tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
        let status = manager.status("broken").await.unwrap();
        assert_eq!(status.state, ServerState::Failed);
        assert!(status.last_error.is_some());
        // Other servers (none here, but the manager itself) keep serving;
        // invoking the broken one fails cleanly rather than panicking.
        let result = manager.invoke("broken", "search", serde_json::json!({})).await;
        assert!(result.is_err());
    }

    struct FlakyInitTransport {
        attempts: Arc<AtomicUsize>,
        succeed_on_attempt: usize,
    }

    #[async_trait]
    impl ToolServerTransport for FlakyInitTransport {
        async fn initialize(&mut self) -> Result<Vec<ToolDescriptor>, ToolServerError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt + 1 < self.succeed_on_attempt {
                return Err(ToolServerError::ProcessExited);
            }
            Ok(vec![])
        }

        async fn invoke(&mut self, _tool: &str, _args: Value) -> Result<Value, ToolServerError> {
            Ok(serde_json::json!({}))
        }

        async fn shutdown(&mut self) {}
    }

    #[tokio::test]
    async fn startup_retries_recover_from_transient_initialize_failures() {
        let manager = RemoteToolServerManager::new(false);
        let attempts = Arc::new(AtomicUsize::new(0));
        manager
            .add_server(
                ToolServerSpec::new(
                    "flaky",
                    Box::new(FlakyInitTransport {
                        attempts: attempts.clone(),
                        succeed_on_attempt: 3,
                    }),
                )
                .with_startup_retry(5, 1),
            )
            .await;
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        let status = manager.status("flaky").await.unwrap();
        assert_eq!(status.state, ServerState::Ready);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn startup_gives_up_after_exhausting_retries() {
        let manager = RemoteToolServerManager::new(false);
        manager
            .add_server(
                ToolServerSpec::new(
                    "broken-with-retry",
                    Box::new(MockTransport {
                        fail_init: true,
                        invoke_calls: Arc::new(AtomicUsize::new(0)),
                        idempotent: false,
                    }),
                )
                .with_startup_retry(2, 1),
            )
            .await;
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        let status = manager.status("broken-with-retry").await.unwrap();
        assert_eq!(status.state, ServerState::Failed);
    }

    #[tokio::test]
    async fn idempotent_transport_retries_once_after_failure() {
        let manager = RemoteToolServerManager::new(false);
        manager
            .add_server(ToolServerSpec::new("http-server".into(), Box::new(MockTransport {
                    fail_init: false,
                    invoke_calls: Arc::new(AtomicUsize::new(0)),
                    idempotent: true,
                })))
            .await;
        tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
        let result = manager
            .invoke("http-server", "search", serde_json::json!({"q":"rust"}))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn shutdown_marks_server_stopped() {
        let manager = RemoteToolServerManager::new(false);
        manager
            .add_server(ToolServerSpec::new("s1".into(), Box::new(MockTransport {
                    fail_init: false,
                    invoke_calls: Arc::new(AtomicUsize::new(0)),
                    idempotent: false,
                })))
            .await;
        tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
        manager.shutdown_all().await;
        tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
        assert_eq!(manager.status("s1").await.unwrap().state, ServerState::Stopped);
    }
}
