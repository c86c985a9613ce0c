//! Dynamic tool mirror.
//!
//! Mirrors every managed server's tool list onto the bridge's own tool
//! surface under a `<server>_<tool>` namespace, and tears the mirror down
//! when a server leaves `Running`. While a server runs, its registrations
//! are a bijection with its tool list; the orchestrator maintains that by
//! pairing every registry transition with the matching call here.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use toolbridge_core::{ToolCallResult, ToolDef, ToolHandler, ToolSurface, ToolSurfaceError};

use crate::registry::ManagedServerRegistry;

/// Read-only statistics over the mirrored tools.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStats {
    /// Servers with at least one mirrored tool entry.
    pub total_servers: usize,
    /// Mirrored tools across all servers.
    pub total_tools: usize,
    /// Tool count per server.
    pub per_server: HashMap<String, usize>,
}

/// Proxy handler forwarding one namespaced tool to its server's live
/// connection.
struct ProxyToolHandler {
    registry: Arc<ManagedServerRegistry>,
    server_name: String,
    tool_name: String,
}

#[async_trait]
impl ToolHandler for ProxyToolHandler {
    async fn call(&self, arguments: Value) -> ToolCallResult {
        match self
            .registry
            .call_tool(&self.server_name, &self.tool_name, arguments)
            .await
        {
            Ok(result) => result,
            Err(e) => ToolCallResult::error(format!("failed to invoke {}: {e}", self.tool_name)),
        }
    }
}

/// The mirror itself: owns the server-to-registrations mapping and is the
/// only code that mutates the host surface.
pub struct DynamicToolRegistry {
    surface: Arc<dyn ToolSurface>,
    registry: Arc<ManagedServerRegistry>,
    registered: RwLock<HashMap<String, Vec<String>>>,
}

impl DynamicToolRegistry {
    /// Create a mirror over the given surface and registry.
    pub fn new(surface: Arc<dyn ToolSurface>, registry: Arc<ManagedServerRegistry>) -> Self {
        Self {
            surface,
            registry,
            registered: RwLock::new(HashMap::new()),
        }
    }

    /// Register a proxy for each tool under `<server>_<tool>`.
    ///
    /// A surface rejection (duplicate name) is a programming-error signal:
    /// everything added so far is rolled back and the error propagates.
    pub async fn add_server_tools(
        &self,
        server_name: &str,
        tools: &[ToolDef],
    ) -> Result<(), ToolSurfaceError> {
        let mut added: Vec<String> = Vec::with_capacity(tools.len());

        for tool in tools {
            let namespaced = tool.namespaced(server_name);
            let proxy = ToolDef {
                name: namespaced.clone(),
                description: tool.description.clone(),
                input_schema: tool.input_schema.clone(),
            };
            let handler = Arc::new(ProxyToolHandler {
                registry: Arc::clone(&self.registry),
                server_name: server_name.to_string(),
                tool_name: tool.name.clone(),
            });

            if let Err(e) = self.surface.add_tool(proxy, handler) {
                tracing::error!(
                    server_name = %server_name,
                    tool = %namespaced,
                    error = %e,
                    "Tool registration rejected"
                );
                for name in &added {
                    let _ = self.surface.remove_tool(name);
                }
                return Err(e);
            }
            added.push(namespaced);
        }

        tracing::info!(
            server_name = %server_name,
            tool_count = added.len(),
            "Registered server tools"
        );
        self.registered
            .write()
            .await
            .entry(server_name.to_string())
            .or_default()
            .extend(added);
        Ok(())
    }

    /// Unregister every tool attributed to a server. Safe when the server
    /// had none. Returns how many were removed.
    pub async fn remove_server_tools(&self, server_name: &str) -> usize {
        let names = self
            .registered
            .write()
            .await
            .remove(server_name)
            .unwrap_or_default();

        let mut removed = 0;
        for name in &names {
            match self.surface.remove_tool(name) {
                Ok(()) => removed += 1,
                Err(e) => {
                    tracing::warn!(tool = %name, error = %e, "Tool removal failed");
                }
            }
        }

        if removed > 0 {
            tracing::info!(
                server_name = %server_name,
                tool_count = removed,
                "Unregistered server tools"
            );
        }
        removed
    }

    /// Remove-then-add, for restarts where the downstream tool list may
    /// have changed.
    pub async fn refresh_server_tools(
        &self,
        server_name: &str,
        tools: &[ToolDef],
    ) -> Result<(), ToolSurfaceError> {
        self.remove_server_tools(server_name).await;
        self.add_server_tools(server_name, tools).await
    }

    /// Tear down every mirror entry. Returns how many tools were removed.
    pub async fn clear_all(&self) -> usize {
        let server_names: Vec<String> = self.registered.read().await.keys().cloned().collect();
        let mut removed = 0;
        for name in server_names {
            removed += self.remove_server_tools(&name).await;
        }
        removed
    }

    /// Counts only; no side effects.
    pub async fn stats(&self) -> RegistryStats {
        let registered = self.registered.read().await;
        let per_server: HashMap<String, usize> = registered
            .iter()
            .map(|(name, tools)| (name.clone(), tools.len()))
            .collect();

        RegistryStats {
            total_servers: registered.len(),
            total_tools: per_server.values().sum(),
            per_server,
        }
    }

    /// Full dump of the server-to-tools mapping, for diagnostics.
    pub async fn export_state(&self) -> HashMap<String, Vec<String>> {
        let registered = self.registered.read().await;
        registered
            .iter()
            .map(|(name, tools)| {
                let mut sorted = tools.clone();
                sorted.sort();
                (name.clone(), sorted)
            })
            .collect()
    }
}
