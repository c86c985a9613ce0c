//! Downstream server connection ports.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::domain::{LaunchSpec, ToolCallResult, ToolDef};

/// Errors that can occur while establishing or using a connection to a
/// downstream tool server.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("Failed to spawn server process: {0}")]
    SpawnFailed(String),

    #[error("Failed to communicate with server: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Timeout waiting for server response")]
    Timeout,

    #[error("Server returned error: code={code}, message={message}")]
    ServerError { code: i64, message: String },

    #[error("Server not connected")]
    NotConnected,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error(
        "All transports failed: streamable-http ({streamable}); sse ({sse})"
    )]
    AllTransportsFailed { streamable: String, sse: String },
}

/// A live connection to a downstream tool server.
///
/// One connection is exclusively owned by its registry entry (managed
/// servers) or shared through the connection cache (remote endpoints).
#[async_trait]
pub trait ServerConnection: Send + Sync {
    /// List the tools the server advertises.
    async fn list_tools(&self) -> Result<Vec<ToolDef>, ConnectError>;

    /// Call a tool with the given JSON arguments.
    async fn call_tool(&self, name: &str, arguments: Value)
    -> Result<ToolCallResult, ConnectError>;

    /// Close the connection. Best-effort: implementations log failures
    /// instead of returning them.
    async fn close(&self);
}

/// Opens connections to managed servers from their launch specs.
///
/// The production implementation spawns the launch command and speaks the
/// tool protocol over the child's stdio; tests substitute fakes.
#[async_trait]
pub trait ServerConnector: Send + Sync {
    /// Launch the server described by `spec` and complete the protocol
    /// handshake.
    async fn connect(&self, spec: &LaunchSpec) -> Result<Box<dyn ServerConnection>, ConnectError>;
}
