//! JSON-RPC client over a managed server's stdio.
//!
//! The bridge launches a managed server's command (usually `docker run -i`)
//! and speaks line-delimited JSON-RPC over the child's stdin/stdout. One
//! request is in flight at a time per connection; the registry serializes
//! operations anyway, so there is no pipelining here.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tokio::time::timeout;

use toolbridge_core::{
    ConnectError, LaunchSpec, ServerConnection, ServerConnector, ToolCallResult, ToolDef,
};

use crate::rpc::{JsonRpcRequest, JsonRpcResponse, REQUEST_TIMEOUT, initialize_params,
    parse_tool_list};

/// Maximum non-JSON lines to skip while waiting for a response. Package
/// runners tend to print install banners before the server speaks.
const MAX_NOISE_LINES: usize = 10;

struct StdioPipes {
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

/// A live stdio connection to a spawned tool server.
pub struct StdioConnection {
    pipes: Mutex<Option<StdioPipes>>,
    child: Mutex<Option<Child>>,
    request_id: AtomicU64,
    tools_supported: bool,
}

impl StdioConnection {
    /// Spawn the launch command and complete the protocol handshake.
    pub async fn connect(spec: &LaunchSpec) -> Result<Self, ConnectError> {
        if spec.command.is_empty() {
            return Err(ConnectError::SpawnFailed(
                "Launch command is empty".to_string(),
            ));
        }

        let mut command = Command::new(&spec.command);
        command
            .args(&spec.args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true);

        for pair in &spec.env {
            command.env(&pair.key, &pair.value);
        }

        let mut child = command.spawn().map_err(|e| {
            ConnectError::SpawnFailed(format!(
                "Failed to spawn '{}': {e} (args: {:?})",
                spec.command, spec.args
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ConnectError::SpawnFailed("Failed to get stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ConnectError::SpawnFailed("Failed to get stdout".to_string()))?;

        let connection = Self {
            pipes: Mutex::new(Some(StdioPipes {
                stdin,
                stdout: BufReader::new(stdout),
            })),
            child: Mutex::new(Some(child)),
            request_id: AtomicU64::new(1),
            tools_supported: true,
        };

        let init = connection.request("initialize", Some(initialize_params())).await?;
        let tools_supported = init
            .get("capabilities")
            .and_then(|c| c.get("tools"))
            .is_some();

        connection.notify("notifications/initialized", None).await?;

        Ok(Self {
            tools_supported,
            ..connection
        })
    }

    /// Send one request and wait for its response.
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, ConnectError> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest::new(id, method, params);
        let line = serde_json::to_string(&request)? + "\n";

        let mut guard = self.pipes.lock().await;
        let pipes = guard.as_mut().ok_or(ConnectError::NotConnected)?;

        pipes.stdin.write_all(line.as_bytes()).await?;
        pipes.stdin.flush().await?;

        let response = timeout(REQUEST_TIMEOUT, Self::read_response(&mut pipes.stdout, id))
            .await
            .map_err(|_| ConnectError::Timeout)??;

        response.into_result()
    }

    /// Read lines until a valid JSON-RPC response for `id` shows up,
    /// skipping start-up noise from package runners.
    async fn read_response(
        stdout: &mut BufReader<ChildStdout>,
        id: u64,
    ) -> Result<JsonRpcResponse, ConnectError> {
        let mut skipped = 0;
        while skipped < MAX_NOISE_LINES {
            let mut line = String::new();
            let read = stdout.read_line(&mut line).await?;
            if read == 0 {
                return Err(ConnectError::Protocol(
                    "Server closed connection".to_string(),
                ));
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            if let Ok(response) = serde_json::from_str::<JsonRpcResponse>(trimmed) {
                if response.id == Some(id) {
                    return Ok(response);
                }
                // Notification or stale response; keep reading.
                tracing::debug!(line = trimmed, "Skipping unmatched JSON-RPC message");
                continue;
            }

            tracing::debug!(line = trimmed, "Skipping non-JSON-RPC output");
            skipped += 1;
        }

        Err(ConnectError::Protocol(
            "No valid JSON-RPC response received".to_string(),
        ))
    }

    /// Send a notification (no response expected).
    async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), ConnectError> {
        let notification = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params.unwrap_or_else(|| json!({}))
        });
        let line = serde_json::to_string(&notification)? + "\n";

        let mut guard = self.pipes.lock().await;
        let pipes = guard.as_mut().ok_or(ConnectError::NotConnected)?;
        pipes.stdin.write_all(line.as_bytes()).await?;
        pipes.stdin.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl ServerConnection for StdioConnection {
    async fn list_tools(&self) -> Result<Vec<ToolDef>, ConnectError> {
        if !self.tools_supported {
            return Ok(Vec::new());
        }
        let result = self.request("tools/list", None).await?;
        parse_tool_list(&result)
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
    ) -> Result<ToolCallResult, ConnectError> {
        let params = json!({
            "name": name,
            "arguments": arguments
        });
        let result = self.request("tools/call", Some(params)).await?;
        Ok(ToolCallResult::from_response(&result))
    }

    async fn close(&self) {
        // Dropping stdin signals EOF to well-behaved servers.
        self.pipes.lock().await.take();

        if let Some(mut child) = self.child.lock().await.take() {
            if let Err(e) = child.kill().await {
                tracing::warn!(error = %e, "Failed to kill server process");
            }
        }
    }
}

/// Production `ServerConnector`: spawns the launch command and speaks the
/// protocol over stdio.
#[derive(Debug, Clone, Default)]
pub struct StdioConnector;

impl StdioConnector {
    /// Create a new connector.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ServerConnector for StdioConnector {
    async fn connect(&self, spec: &LaunchSpec) -> Result<Box<dyn ServerConnection>, ConnectError> {
        let connection = StdioConnection::connect(spec).await?;
        Ok(Box::new(connection))
    }
}
