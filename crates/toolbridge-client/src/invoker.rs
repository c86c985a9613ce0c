//! Ad-hoc tool invocation against remote endpoints.

use std::sync::Arc;

use serde_json::Value;

use toolbridge_core::ToolCallResult;

use crate::cache::ConnectionCache;
use crate::http::RemoteConnector;

/// One ad-hoc invocation request.
#[derive(Debug, Clone)]
pub struct InvokeRequest {
    /// Remote endpoint URL.
    pub endpoint: String,
    /// Auth headers forwarded to the endpoint.
    pub headers: Vec<(String, String)>,
    /// Tool to call.
    pub tool_name: String,
    /// JSON arguments passed through verbatim.
    pub arguments: Value,
}

/// Invokes tools on arbitrary remote endpoints through the connection
/// cache.
///
/// `invoke` never returns an error to the caller: a single proxied tool
/// failure must not crash the bridge or abort unrelated calls, so every
/// failure is folded into a uniform error result.
pub struct ToolInvoker {
    cache: ConnectionCache,
}

impl ToolInvoker {
    /// Invoker over the production transport stack.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache: ConnectionCache::new(),
        }
    }

    /// Invoker over an explicit connector (used by tests).
    #[must_use]
    pub fn with_connector(connector: Arc<dyn RemoteConnector>) -> Self {
        Self {
            cache: ConnectionCache::with_connector(connector),
        }
    }

    /// Call a tool, reusing a cached connection when one exists.
    pub async fn invoke(&self, request: InvokeRequest) -> ToolCallResult {
        let connection = match self
            .cache
            .get_or_connect(&request.endpoint, &request.headers)
            .await
        {
            Ok(connection) => connection,
            Err(e) => {
                tracing::warn!(
                    endpoint = %request.endpoint,
                    tool = %request.tool_name,
                    error = %e,
                    "Connection failed"
                );
                return ToolCallResult::error(format!(
                    "failed to invoke {}: {e}",
                    request.tool_name
                ));
            }
        };

        match connection
            .call_tool(&request.tool_name, request.arguments)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(
                    endpoint = %request.endpoint,
                    tool = %request.tool_name,
                    error = %e,
                    "Tool call failed"
                );
                ToolCallResult::error(format!("failed to invoke {}: {e}", request.tool_name))
            }
        }
    }

    /// Close all cached connections without waiting (forced reset).
    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    /// Close all cached connections and wait for them (shutdown).
    pub async fn close(&self) {
        self.cache.close().await;
    }

    /// Number of live cached connections.
    pub async fn cached_connections(&self) -> usize {
        self.cache.len().await
    }
}

impl Default for ToolInvoker {
    fn default() -> Self {
        Self::new()
    }
}
