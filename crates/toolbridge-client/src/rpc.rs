//! JSON-RPC 2.0 message shapes shared by the stdio and HTTP transports.
//!
//! Reference: <https://spec.modelcontextprotocol.io/>

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;

use toolbridge_core::{ConnectError, ToolDef};

/// Protocol version the bridge negotiates.
pub(crate) const PROTOCOL_VERSION: &str = "2025-03-26";

/// Bound on every downstream request, connection establishment included.
/// A stuck server must not hang the caller indefinitely.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// JSON-RPC 2.0 request.
#[derive(Debug, Serialize)]
pub(crate) struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: &str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: method.to_string(),
            params,
        }
    }
}

/// JSON-RPC 2.0 response.
#[derive(Debug, Deserialize)]
pub(crate) struct JsonRpcResponse {
    #[allow(dead_code)] // Required by serde deserialization
    pub jsonrpc: String,
    pub id: Option<u64>,
    pub result: Option<Value>,
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error.
#[derive(Debug, Deserialize)]
pub(crate) struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(rename = "data")]
    pub _data: Option<Value>,
}

impl JsonRpcResponse {
    /// Extract the result payload, converting protocol errors.
    pub fn into_result(self) -> Result<Value, ConnectError> {
        if let Some(err) = self.error {
            return Err(ConnectError::ServerError {
                code: err.code,
                message: err.message,
            });
        }
        self.result
            .ok_or_else(|| ConnectError::Protocol("Missing result in response".to_string()))
    }
}

/// Parameters for the `initialize` request.
pub(crate) fn initialize_params() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "clientInfo": {
            "name": "toolbridge",
            "version": env!("CARGO_PKG_VERSION")
        },
        "capabilities": {}
    })
}

/// Tool entry from `tools/list`.
#[derive(Debug, Deserialize)]
struct ToolSchema {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, rename = "inputSchema")]
    input_schema: Option<Value>,
}

/// Parse a `tools/list` result into tool definitions.
pub(crate) fn parse_tool_list(result: &Value) -> Result<Vec<ToolDef>, ConnectError> {
    let tools_value = result.get("tools").cloned().unwrap_or_else(|| json!([]));
    let tools: Vec<ToolSchema> = serde_json::from_value(tools_value)?;

    Ok(tools
        .into_iter()
        .map(|t| {
            let mut def = ToolDef::new(t.name);
            if let Some(desc) = t.description {
                def = def.with_description(desc);
            }
            if let Some(schema) = t.input_schema {
                def = def.with_input_schema(schema);
            }
            def
        })
        .collect())
}
