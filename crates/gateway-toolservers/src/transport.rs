//! The `ToolServerTransport` trait and its three implementations, per spec
//! §4.I: long-running stdio child process, container, and HTTP+SSE.

use crate::ToolDescriptor;
use async_trait::async_trait;
use serde_json::Value;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};

#[derive(Debug, Error)]
pub enum ToolServerError {
    #[error("transport I/O error: {0}")]
    Io(String),
    #[error("child process exited unexpectedly")]
    ProcessExited,
    #[error("malformed response from tool server: {0}")]
    MalformedResponse(String),
    #[error("tool server returned an error: {0}")]
    RemoteError(String),
    #[error("http transport error: {0}")]
    Http(String),
}

/// Whether a transport's invocation is safe to retry after a reconnect
/// (spec §4.I: "the manager may attempt a single reconnect+retry for
/// idempotent transports only").
pub trait TransportIdempotency {
    fn idempotent_invocations(&self) -> bool;
}

#[async_trait]
pub trait ToolServerTransport: Send + Sync {
    /// `spawn -> initialize -> ready`: performs the handshake and returns
    /// the tools the remote side exposes.
    async fn initialize(&mut self) -> Result<Vec<ToolDescriptor>, ToolServerError>;

    async fn invoke(&mut self, tool: &str, args: Value) -> Result<Value, ToolServerError>;

    /// Graceful shutdown: a stop signal with a small grace period before
    /// the process (if any) is killed. No-op for stateless transports.
    async fn shutdown(&mut self);

    fn is_idempotent(&self) -> bool {
        false
    }
}

/// One line-delimited-JSON request, mirroring the envelope protocol's
/// `{id, method, params}` shape (spec §4.B), reused here as the wire format
/// a long-running stdio tool server speaks.
#[derive(serde::Serialize)]
struct LineRequest<'a> {
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(serde::Deserialize)]
struct LineResponse {
    #[allow(dead_code)]
    id: u64,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<LineError>,
}

#[derive(serde::Deserialize)]
struct LineError {
    message: String,
}

/// Line-delimited JSON request/response over a child process's stdio,
/// matching the teacher's line-framed transport idiom generalized from a
/// single MCP connection to one-request-per-line-in-one-line-out.
pub struct StdioChildTransport {
    child: Child,
    stdin: tokio::process::ChildStdin,
    stdout: BufReader<tokio::process::ChildStdout>,
    next_id: u64,
}

impl StdioChildTransport {
    /// Spawns `command` with piped stdio. Used directly for the
    /// long-running-process transport, and by [`crate::ContainerTransport`]
    /// which only differs in how the `Command` is constructed.
    pub fn spawn(mut command: Command) -> Result<Self, ToolServerError> {
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let mut child = command.spawn().map_err(|e| ToolServerError::Io(e.to_string()))?;
        let stdin = child.stdin.take().ok_or_else(|| ToolServerError::Io("no stdin".into()))?;
        let stdout = child.stdout.take().ok_or_else(|| ToolServerError::Io("no stdout".into()))?;
        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            next_id: 0,
        })
    }

    async fn roundtrip(&mut self, method: &str, params: Value) -> Result<Value, ToolServerError> {
        self.next_id += 1;
        let request = LineRequest {
            id: self.next_id,
            method,
            params,
        };
        let mut line = serde_json::to_string(&request).map_err(|e| ToolServerError::Io(e.to_string()))?;
        line.push('\n');
        self.stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| ToolServerError::Io(e.to_string()))?;

        let mut buf = String::new();
        let n = self
            .stdout
            .read_line(&mut buf)
            .await
            .map_err(|e| ToolServerError::Io(e.to_string()))?;
        if n == 0 {
            return Err(ToolServerError::ProcessExited);
        }
        let response: LineResponse =
            serde_json::from_str(buf.trim_end()).map_err(|e| ToolServerError::MalformedResponse(e.to_string()))?;
        if let Some(error) = response.error {
            return Err(ToolServerError::RemoteError(error.message));
        }
        response
            .result
            .ok_or_else(|| ToolServerError::MalformedResponse("missing result".into()))
    }
}

#[async_trait]
impl ToolServerTransport for StdioChildTransport {
    async fn initialize(&mut self) -> Result<Vec<ToolDescriptor>, ToolServerError> {
        self.roundtrip("initialize", serde_json::json!({})).await?;
        let result = self.roundtrip("tools/list", serde_json::json!({})).await?;
        let tools: Vec<ToolDescriptor> =
            serde_json::from_value(result.get("tools").cloned().unwrap_or(Value::Array(vec![])))
                .map_err(|e| ToolServerError::MalformedResponse(e.to_string()))?;
        Ok(tools)
    }

    async fn invoke(&mut self, tool: &str, args: Value) -> Result<Value, ToolServerError> {
        self.roundtrip(
            "tools/call",
            serde_json::json!({ "name": tool, "arguments": args }),
        )
        .await
    }

    async fn shutdown(&mut self) {
        let _ = self.child.start_kill();
        let grace = tokio::time::Duration::from_secs(3);
        let _ = tokio::time::timeout(grace, self.child.wait()).await;
    }

    fn is_idempotent(&self) -> bool {
        false
    }
}

/// Same wire framing as [`StdioChildTransport`]; the only difference is
/// that the process is started via a container runtime CLI rather than
/// directly.
pub struct ContainerTransport {
    inner: StdioChildTransport,
}

impl ContainerTransport {
    pub fn spawn(
        runtime: &str,
        image: &str,
        args: &[String],
        host_mount: Option<(&str, &str)>,
    ) -> Result<Self, ToolServerError> {
        let mut command = Command::new(runtime);
        command.arg("run").arg("-i").arg("--rm");
        if let Some((host_dir, container_dir)) = host_mount {
            command.arg("-v").arg(format!("{host_dir}:{container_dir}"));
        }
        command.arg(image);
        command.args(args);
        Ok(Self {
            inner: StdioChildTransport::spawn(command)?,
        })
    }
}

#[async_trait]
impl ToolServerTransport for ContainerTransport {
    async fn initialize(&mut self) -> Result<Vec<ToolDescriptor>, ToolServerError> {
        self.inner.initialize().await
    }

    async fn invoke(&mut self, tool: &str, args: Value) -> Result<Value, ToolServerError> {
        self.inner.invoke(tool, args).await
    }

    async fn shutdown(&mut self) {
        self.inner.shutdown().await
    }

    fn is_idempotent(&self) -> bool {
        false
    }
}

/// Handshake and tool discovery over plain HTTP request/response;
/// long-running notifications are read from a persistent SSE stream
/// (spec §4.I). Invocations are idempotent from the manager's point of
/// view: a failed HTTP call can be safely retried against a fresh
/// connection.
pub struct HttpSseTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSseTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Opens the server-sent-events stream carrying progress
    /// notifications. Returned as raw bytes; callers parse `data: ` lines.
    pub async fn notifications_stream(
        &self,
    ) -> Result<impl futures::Stream<Item = reqwest::Result<bytes::Bytes>>, ToolServerError> {
        let response = self
            .client
            .get(format!("{}/events", self.base_url))
            .header("accept", "text/event-stream")
            .send()
            .await
            .map_err(|e| ToolServerError::Http(e.to_string()))?;
        Ok(response.bytes_stream())
    }
}

#[async_trait]
impl ToolServerTransport for HttpSseTransport {
    async fn initialize(&mut self) -> Result<Vec<ToolDescriptor>, ToolServerError> {
        let response = self
            .client
            .post(format!("{}/initialize", self.base_url))
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| ToolServerError::Http(e.to_string()))?;
        let list: Value = response
            .json()
            .await
            .map_err(|e| ToolServerError::Http(e.to_string()))?;
        serde_json::from_value(list.get("tools").cloned().unwrap_or(Value::Array(vec![])))
            .map_err(|e| ToolServerError::MalformedResponse(e.to_string()))
    }

    async fn invoke(&mut self, tool: &str, args: Value) -> Result<Value, ToolServerError> {
        let response = self
            .client
            .post(format!("{}/tools/call", self.base_url))
            .json(&serde_json::json!({ "name": tool, "arguments": args }))
            .send()
            .await
            .map_err(|e| ToolServerError::Http(e.to_string()))?;
        response
            .json()
            .await
            .map_err(|e| ToolServerError::Http(e.to_string()))
    }

    async fn shutdown(&mut self) {}

    fn is_idempotent(&self) -> bool {
        true
    }
}
