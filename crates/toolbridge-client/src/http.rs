//! Remote endpoint transports.
//!
//! Two ways to reach a remote tool server: the streamable HTTP transport
//! (single endpoint, session header) and the legacy HTTP+SSE transport
//! (long-lived event stream plus a message-post endpoint). Connection
//! policy: streamable first, one SSE attempt on failure, then a single
//! consolidated error naming both.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::{Value, json};
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use url::Url;

use toolbridge_core::{ConnectError, ServerConnection, ToolCallResult, ToolDef};

use crate::rpc::{JsonRpcRequest, JsonRpcResponse, REQUEST_TIMEOUT, initialize_params,
    parse_tool_list};
use crate::sse;

const SESSION_HEADER: &str = "Mcp-Session-Id";

/// Creates connections to remote endpoints. The cache only sees this
/// trait, which keeps transport policy swappable in tests.
#[async_trait]
pub trait RemoteConnector: Send + Sync {
    /// Connect to `endpoint` with the given auth headers.
    async fn connect(
        &self,
        endpoint: &str,
        headers: &[(String, String)],
    ) -> Result<Arc<dyn ServerConnection>, ConnectError>;
}

fn map_reqwest_error(e: &reqwest::Error) -> ConnectError {
    if e.is_timeout() {
        ConnectError::Timeout
    } else {
        ConnectError::Transport(e.to_string())
    }
}

fn apply_headers(
    mut builder: reqwest::RequestBuilder,
    headers: &[(String, String)],
) -> reqwest::RequestBuilder {
    for (key, value) in headers {
        builder = builder.header(key, value);
    }
    builder
}

/// Extract the JSON-RPC response for `id` from a response body that may be
/// plain JSON or a short SSE stream.
fn parse_response_body(
    content_type: &str,
    body: &str,
    id: u64,
) -> Result<JsonRpcResponse, ConnectError> {
    if content_type.starts_with("text/event-stream") {
        for event in sse::parse_body(body) {
            if let Ok(response) = serde_json::from_str::<JsonRpcResponse>(&event.data) {
                if response.id == Some(id) {
                    return Ok(response);
                }
            }
        }
        return Err(ConnectError::Protocol(
            "No matching response in event stream".to_string(),
        ));
    }

    let response: JsonRpcResponse = serde_json::from_str(body)?;
    if response.id != Some(id) {
        return Err(ConnectError::Protocol(format!(
            "Response id mismatch (expected {id}, got {:?})",
            response.id
        )));
    }
    Ok(response)
}

// ============================================================================
// Streamable HTTP (primary)
// ============================================================================

/// Connection over the streamable HTTP transport: every request is a POST
/// to the same endpoint, with the server-issued session id echoed back.
pub struct StreamableHttpConnection {
    client: reqwest::Client,
    endpoint: String,
    headers: Vec<(String, String)>,
    session: std::sync::Mutex<Option<String>>,
    request_id: AtomicU64,
}

impl StreamableHttpConnection {
    async fn connect(
        client: reqwest::Client,
        endpoint: &str,
        headers: &[(String, String)],
    ) -> Result<Self, ConnectError> {
        let connection = Self {
            client,
            endpoint: endpoint.to_string(),
            headers: headers.to_vec(),
            session: std::sync::Mutex::new(None),
            request_id: AtomicU64::new(1),
        };

        connection.request("initialize", Some(initialize_params())).await?;
        connection.notify("notifications/initialized").await?;
        Ok(connection)
    }

    fn session_id(&self) -> Option<String> {
        self.session.lock().map(|s| s.clone()).unwrap_or_default()
    }

    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, ConnectError> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest::new(id, method, params);

        let mut builder = self
            .client
            .post(&self.endpoint)
            .header(ACCEPT, "application/json, text/event-stream")
            .json(&request);
        builder = apply_headers(builder, &self.headers);
        if let Some(session) = self.session_id() {
            builder = builder.header(SESSION_HEADER, session);
        }

        let response = builder.send().await.map_err(|e| map_reqwest_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConnectError::Transport(format!(
                "HTTP {status} from {}",
                self.endpoint
            )));
        }

        if let Some(session) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            if let Ok(mut slot) = self.session.lock() {
                *slot = Some(session.to_string());
            }
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/json")
            .to_string();
        let body = response.text().await.map_err(|e| map_reqwest_error(&e))?;

        parse_response_body(&content_type, &body, id)?.into_result()
    }

    async fn notify(&self, method: &str) -> Result<(), ConnectError> {
        let notification = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": {}
        });

        let mut builder = self
            .client
            .post(&self.endpoint)
            .header(ACCEPT, "application/json, text/event-stream")
            .json(&notification);
        builder = apply_headers(builder, &self.headers);
        if let Some(session) = self.session_id() {
            builder = builder.header(SESSION_HEADER, session);
        }

        let response = builder.send().await.map_err(|e| map_reqwest_error(&e))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(ConnectError::Transport(format!(
                "HTTP {} from {}",
                response.status(),
                self.endpoint
            )))
        }
    }
}

#[async_trait]
impl ServerConnection for StreamableHttpConnection {
    async fn list_tools(&self) -> Result<Vec<ToolDef>, ConnectError> {
        let result = self.request("tools/list", None).await?;
        parse_tool_list(&result)
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
    ) -> Result<ToolCallResult, ConnectError> {
        let params = json!({"name": name, "arguments": arguments});
        let result = self.request("tools/call", Some(params)).await?;
        Ok(ToolCallResult::from_response(&result))
    }

    async fn close(&self) {
        // Session termination is advisory; failures only get logged.
        let Some(session) = self.session_id() else {
            return;
        };
        let mut builder = self.client.delete(&self.endpoint).header(SESSION_HEADER, session);
        builder = apply_headers(builder, &self.headers);
        if let Err(e) = builder.send().await {
            tracing::debug!(endpoint = %self.endpoint, error = %e, "Session delete failed");
        }
    }
}

/// Connector for the streamable HTTP transport.
#[derive(Clone)]
pub struct StreamableHttpConnector {
    client: reqwest::Client,
}

impl StreamableHttpConnector {
    /// Create a connector sharing the given HTTP client.
    #[must_use]
    pub const fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RemoteConnector for StreamableHttpConnector {
    async fn connect(
        &self,
        endpoint: &str,
        headers: &[(String, String)],
    ) -> Result<Arc<dyn ServerConnection>, ConnectError> {
        let connection =
            StreamableHttpConnection::connect(self.client.clone(), endpoint, headers).await?;
        Ok(Arc::new(connection))
    }
}

// ============================================================================
// HTTP + SSE (fallback)
// ============================================================================

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>>;

/// Connection over the legacy HTTP+SSE transport: a long-lived GET stream
/// carries responses; requests are POSTed to the endpoint the stream's
/// first event announces.
pub struct SseConnection {
    client: reqwest::Client,
    message_url: String,
    headers: Vec<(String, String)>,
    pending: PendingMap,
    reader: std::sync::Mutex<Option<JoinHandle<()>>>,
    request_id: AtomicU64,
}

impl SseConnection {
    async fn connect(
        client: reqwest::Client,
        endpoint: &str,
        headers: &[(String, String)],
    ) -> Result<Self, ConnectError> {
        let mut builder = client.get(endpoint).header(ACCEPT, "text/event-stream");
        builder = apply_headers(builder, headers);
        let response = builder.send().await.map_err(|e| map_reqwest_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConnectError::Transport(format!(
                "HTTP {status} from {endpoint}"
            )));
        }

        let mut stream = response.bytes_stream();
        let mut parser = sse::SseParser::new();

        // The server's first event names the message-post endpoint.
        let message_url = timeout(REQUEST_TIMEOUT, async {
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(|e| map_reqwest_error(&e))?;
                for event in parser.feed(&String::from_utf8_lossy(&chunk)) {
                    if event.event.as_deref() == Some("endpoint") {
                        return resolve_message_url(endpoint, &event.data);
                    }
                }
            }
            Err(ConnectError::Protocol(
                "Event stream ended before endpoint event".to_string(),
            ))
        })
        .await
        .map_err(|_| ConnectError::Timeout)??;

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));

        // Background reader routes responses to waiting requests by id.
        let reader_pending = Arc::clone(&pending);
        let reader = tokio::spawn(async move {
            while let Some(chunk) = stream.next().await {
                let Ok(chunk) = chunk else { break };
                for event in parser.feed(&String::from_utf8_lossy(&chunk)) {
                    let Ok(response) = serde_json::from_str::<JsonRpcResponse>(&event.data) else {
                        continue;
                    };
                    let Some(id) = response.id else { continue };
                    if let Some(sender) = reader_pending.lock().await.remove(&id) {
                        let _ = sender.send(response);
                    }
                }
            }
            // Stream gone: wake every waiter with a closed channel.
            reader_pending.lock().await.clear();
        });

        let connection = Self {
            client,
            message_url,
            headers: headers.to_vec(),
            pending,
            reader: std::sync::Mutex::new(Some(reader)),
            request_id: AtomicU64::new(1),
        };

        connection.request("initialize", Some(initialize_params())).await?;
        connection.post_notification("notifications/initialized").await?;
        Ok(connection)
    }

    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, ConnectError> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest::new(id, method, params);

        let (sender, receiver) = oneshot::channel();
        self.pending.lock().await.insert(id, sender);

        let post = async {
            let mut builder = self.client.post(&self.message_url).json(&request);
            builder = apply_headers(builder, &self.headers);
            let response = builder.send().await.map_err(|e| map_reqwest_error(&e))?;
            if response.status().is_success() {
                Ok(())
            } else {
                Err(ConnectError::Transport(format!(
                    "HTTP {} from {}",
                    response.status(),
                    self.message_url
                )))
            }
        };

        if let Err(e) = post.await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        let response = timeout(REQUEST_TIMEOUT, receiver).await;
        match response {
            Ok(Ok(response)) => response.into_result(),
            Ok(Err(_)) => Err(ConnectError::Protocol(
                "Event stream closed before response".to_string(),
            )),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(ConnectError::Timeout)
            }
        }
    }

    async fn post_notification(&self, method: &str) -> Result<(), ConnectError> {
        let notification = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": {}
        });
        let mut builder = self.client.post(&self.message_url).json(&notification);
        builder = apply_headers(builder, &self.headers);
        let response = builder.send().await.map_err(|e| map_reqwest_error(&e))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(ConnectError::Transport(format!(
                "HTTP {} from {}",
                response.status(),
                self.message_url
            )))
        }
    }
}

/// Resolve the endpoint event's payload (absolute or relative) against the
/// stream URL.
fn resolve_message_url(endpoint: &str, payload: &str) -> Result<String, ConnectError> {
    let base = Url::parse(endpoint)
        .map_err(|e| ConnectError::Protocol(format!("Invalid endpoint URL: {e}")))?;
    let resolved = base
        .join(payload)
        .map_err(|e| ConnectError::Protocol(format!("Invalid message endpoint: {e}")))?;
    Ok(resolved.to_string())
}

#[async_trait]
impl ServerConnection for SseConnection {
    async fn list_tools(&self) -> Result<Vec<ToolDef>, ConnectError> {
        let result = self.request("tools/list", None).await?;
        parse_tool_list(&result)
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
    ) -> Result<ToolCallResult, ConnectError> {
        let params = json!({"name": name, "arguments": arguments});
        let result = self.request("tools/call", Some(params)).await?;
        Ok(ToolCallResult::from_response(&result))
    }

    async fn close(&self) {
        if let Ok(mut slot) = self.reader.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }
}

impl Drop for SseConnection {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.reader.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }
}

/// Connector for the legacy HTTP+SSE transport.
#[derive(Clone)]
pub struct SseConnector {
    client: reqwest::Client,
}

impl SseConnector {
    /// Create a connector sharing the given HTTP client.
    #[must_use]
    pub const fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RemoteConnector for SseConnector {
    async fn connect(
        &self,
        endpoint: &str,
        headers: &[(String, String)],
    ) -> Result<Arc<dyn ServerConnection>, ConnectError> {
        let connection = SseConnection::connect(self.client.clone(), endpoint, headers).await?;
        Ok(Arc::new(connection))
    }
}

// ============================================================================
// Fallback policy
// ============================================================================

/// Primary-then-fallback connection policy: streamable HTTP first, one SSE
/// attempt on failure, then a consolidated error naming both transports.
pub struct FallbackConnector {
    primary: Arc<dyn RemoteConnector>,
    secondary: Arc<dyn RemoteConnector>,
}

impl FallbackConnector {
    /// Production policy over a shared HTTP client with the standard
    /// request timeout.
    #[must_use]
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            primary: Arc::new(StreamableHttpConnector::new(client.clone())),
            secondary: Arc::new(SseConnector::new(client)),
        }
    }

    /// Compose an explicit primary/secondary pair (used by tests).
    #[must_use]
    pub fn with_transports(
        primary: Arc<dyn RemoteConnector>,
        secondary: Arc<dyn RemoteConnector>,
    ) -> Self {
        Self { primary, secondary }
    }
}

impl Default for FallbackConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteConnector for FallbackConnector {
    async fn connect(
        &self,
        endpoint: &str,
        headers: &[(String, String)],
    ) -> Result<Arc<dyn ServerConnection>, ConnectError> {
        let primary_err = match self.primary.connect(endpoint, headers).await {
            Ok(connection) => return Ok(connection),
            Err(e) => e,
        };

        tracing::warn!(
            endpoint = %endpoint,
            error = %primary_err,
            "Streamable transport failed, attempting SSE fallback"
        );

        match self.secondary.connect(endpoint, headers).await {
            Ok(connection) => Ok(connection),
            Err(fallback_err) => Err(ConnectError::AllTransportsFailed {
                streamable: primary_err.to_string(),
                sse: fallback_err.to_string(),
            }),
        }
    }
}
