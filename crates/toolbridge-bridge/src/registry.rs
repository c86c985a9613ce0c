//! Managed-server registry.
//!
//! The authoritative in-memory table of locally-managed servers. Owns each
//! server's state machine, its live connection, and every structural
//! mutation. Mutations are serialized by a single ops mutex; reads take
//! snapshot clones under a short read lock. For a given server the live
//! connection exists if and only if its status is `Running`.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

use toolbridge_core::{
    BridgeEvent, ConnectError, ContainerRuntime, ContainerStatus, EventEmitter, ManagedServer,
    ServerConnection, ServerConnector, ServerKind, ServerStatus, ToolCallResult, ToolDef,
};
use toolbridge_docker::DockerLauncher;

/// Diagnostic written when the runtime contradicts a `Running` status.
const CONTAINER_NOT_RUNNING: &str = "Container not running";

/// Errors from registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Unknown server: {0}")]
    NotFound(String),

    #[error("Server already exists: {0}")]
    Duplicate(String),

    #[error("Server already running: {0}")]
    AlreadyRunning(String),

    #[error("Server not running: {0}")]
    NotRunning(String),

    #[error("Failed to start server: {0}")]
    StartFailed(String),

    #[error("Tool call failed: {0}")]
    ToolCallFailed(String),
}

/// Health report for one server.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ServerHealth {
    /// Server name.
    pub name: String,
    /// Status after reconciliation with the container runtime.
    pub status: ServerStatus,
    /// Tools known from the last successful start.
    pub tool_count: usize,
    /// Runtime-level container status, when one was queried.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<ContainerStatus>,
    /// Diagnostic for demotions and other oddities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

/// One unhealthy server and what is wrong with it.
#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthIssue {
    /// Server name.
    pub name: String,
    /// Issues found, human-readable.
    pub issues: Vec<String>,
}

/// Outcome of a full health sweep.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct HealthReport {
    /// Servers with nothing wrong.
    pub healthy: Vec<String>,
    /// Servers with at least one issue.
    pub unhealthy: Vec<HealthIssue>,
}

struct ServerEntry {
    server: ManagedServer,
    connection: Option<Arc<dyn ServerConnection>>,
}

/// The registry. See module docs for the locking discipline.
pub struct ManagedServerRegistry {
    servers: RwLock<HashMap<String, ServerEntry>>,
    // Serializes every structural mutation. Slow I/O (connect, container
    // control) happens under this mutex but never under the map lock, so
    // reads stay responsive while a start is in flight.
    ops: Mutex<()>,
    connector: Arc<dyn ServerConnector>,
    runtime: Arc<dyn ContainerRuntime>,
    launcher: DockerLauncher,
    emitter: Arc<dyn EventEmitter>,
}

impl ManagedServerRegistry {
    /// Create a registry over the given connector and container runtime.
    pub fn new(
        connector: Arc<dyn ServerConnector>,
        runtime: Arc<dyn ContainerRuntime>,
        emitter: Arc<dyn EventEmitter>,
    ) -> Self {
        Self {
            servers: RwLock::new(HashMap::new()),
            ops: Mutex::new(()),
            connector,
            runtime,
            launcher: DockerLauncher::new(),
            emitter,
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Snapshot of one server record.
    pub async fn get_server(&self, name: &str) -> Option<ManagedServer> {
        let servers = self.servers.read().await;
        servers.get(name).map(|e| e.server.clone())
    }

    /// Snapshot of all server records, sorted by name.
    pub async fn list_servers(&self) -> Vec<ManagedServer> {
        let servers = self.servers.read().await;
        let mut list: Vec<ManagedServer> = servers.values().map(|e| e.server.clone()).collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        list
    }

    /// Call a tool on a running server's live connection.
    pub async fn call_tool(
        &self,
        name: &str,
        tool_name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolCallResult, RegistryError> {
        let connection = {
            let servers = self.servers.read().await;
            let entry = servers
                .get(name)
                .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
            entry
                .connection
                .as_ref()
                .map(Arc::clone)
                .ok_or_else(|| RegistryError::NotRunning(name.to_string()))?
        };

        connection
            .call_tool(tool_name, arguments)
            .await
            .map_err(|e| RegistryError::ToolCallFailed(e.to_string()))
    }

    // =========================================================================
    // Structural mutations
    // =========================================================================

    /// Insert a new server record in the `Installing` state.
    pub async fn add_server(&self, server: ManagedServer) -> Result<(), RegistryError> {
        let _ops = self.ops.lock().await;
        let mut servers = self.servers.write().await;

        if servers.contains_key(&server.name) {
            return Err(RegistryError::Duplicate(server.name));
        }

        tracing::info!(
            server_name = %server.name,
            kind = server.kind.as_str(),
            "Added managed server"
        );
        self.emitter
            .emit(BridgeEvent::server_installed(&server.name, server.kind.as_str()));

        servers.insert(
            server.name.clone(),
            ServerEntry {
                server,
                connection: None,
            },
        );
        Ok(())
    }

    /// Start a server: launch, connect, list tools, mark `Running`.
    pub async fn start_server(&self, name: &str) -> Result<Vec<ToolDef>, RegistryError> {
        let _ops = self.ops.lock().await;
        self.start_inner(name).await
    }

    /// Stop a server: close the connection, stop the container if any,
    /// mark `Stopped`. Stopping an already-stopped server is permitted and
    /// clears tools and connection regardless.
    pub async fn stop_server(&self, name: &str) -> Result<(), RegistryError> {
        let _ops = self.ops.lock().await;
        self.stop_inner(name).await
    }

    /// Stop then start. A start failure surfaces after the stop completed.
    pub async fn restart_server(&self, name: &str) -> Result<Vec<ToolDef>, RegistryError> {
        let _ops = self.ops.lock().await;
        self.stop_inner(name).await?;
        self.start_inner(name).await
    }

    /// Stop a server, remove its container resources if any, and delete
    /// the record.
    pub async fn remove_server_completely(&self, name: &str) -> Result<(), RegistryError> {
        let _ops = self.ops.lock().await;
        self.stop_inner(name).await?;

        let removed = {
            let mut servers = self.servers.write().await;
            servers.remove(name)
        };

        if let Some(entry) = removed {
            if entry.server.kind == ServerKind::ContainerPackage {
                let container = self.launcher.container_name(&entry.server);
                if let Err(e) = self.runtime.remove_container(&container).await {
                    tracing::warn!(
                        server_name = %name,
                        container = %container,
                        error = %e,
                        "Failed to remove container"
                    );
                }
            }
        }

        tracing::info!(server_name = %name, "Removed managed server");
        self.emitter.emit(BridgeEvent::server_removed(name));
        Ok(())
    }

    // =========================================================================
    // Health and maintenance
    // =========================================================================

    /// Status and tool count for one server, reconciled against the
    /// container runtime: a `Running` container-kind server whose
    /// container is not actually running is demoted to `Error`.
    pub async fn server_health(&self, name: &str) -> Result<ServerHealth, RegistryError> {
        let _ops = self.ops.lock().await;

        let snapshot = {
            let servers = self.servers.read().await;
            servers
                .get(name)
                .map(|e| e.server.clone())
                .ok_or_else(|| RegistryError::NotFound(name.to_string()))?
        };

        let mut health = ServerHealth {
            name: snapshot.name.clone(),
            status: snapshot.status.clone(),
            tool_count: snapshot.tool_count(),
            container: None,
            diagnostic: None,
        };

        if snapshot.kind == ServerKind::ContainerPackage && snapshot.status.is_running() {
            let container = self.launcher.container_name(&snapshot);
            let container_status = self.runtime.container_status(&container).await;
            health.container = Some(container_status);

            if container_status != ContainerStatus::Running {
                if let Some(logs) = self.runtime.container_logs(&container, 20).await {
                    tracing::warn!(server_name = %name, logs = %logs, "Last container output");
                }
                // The runtime is the source of truth during health checks.
                self.demote_to_error(name, CONTAINER_NOT_RUNNING).await;
                health.status = ServerStatus::Error(CONTAINER_NOT_RUNNING.to_string());
                health.diagnostic = Some(CONTAINER_NOT_RUNNING.to_string());
            }
        }

        Ok(health)
    }

    /// Classify every server as healthy or unhealthy.
    ///
    /// Issues: `error` status, or `running` with zero tools.
    pub async fn health_check_all(&self) -> HealthReport {
        let names: Vec<String> = {
            let servers = self.servers.read().await;
            servers.keys().cloned().collect()
        };

        let mut report = HealthReport::default();
        for name in names {
            let Ok(health) = self.server_health(&name).await else {
                // Removed between snapshot and check; skip.
                continue;
            };

            let mut issues = Vec::new();
            if let ServerStatus::Error(message) = &health.status {
                issues.push(format!("error status: {message}"));
            }
            if health.status.is_running() && health.tool_count == 0 {
                issues.push("running with zero tools".to_string());
            }

            if issues.is_empty() {
                report.healthy.push(name);
            } else {
                report.unhealthy.push(HealthIssue { name, issues });
            }
        }

        report.healthy.sort();
        report.unhealthy.sort_by(|a, b| a.name.cmp(&b.name));
        report
    }

    /// Restart every server currently in `Error` status. Failures are
    /// logged and skipped; the successfully restarted names are returned.
    pub async fn auto_restart(&self) -> Vec<String> {
        let _ops = self.ops.lock().await;

        let errored: Vec<String> = {
            let servers = self.servers.read().await;
            servers
                .values()
                .filter(|e| e.server.status.is_error())
                .map(|e| e.server.name.clone())
                .collect()
        };

        let mut restarted = Vec::new();
        for name in errored {
            if let Err(e) = self.stop_inner(&name).await {
                tracing::warn!(server_name = %name, error = %e, "Auto-restart stop failed");
                continue;
            }
            match self.start_inner(&name).await {
                Ok(_) => {
                    tracing::info!(server_name = %name, "Auto-restarted server");
                    restarted.push(name);
                }
                Err(e) => {
                    tracing::warn!(server_name = %name, error = %e, "Auto-restart failed");
                }
            }
        }

        restarted.sort();
        restarted
    }

    /// Remove container resources for stopped container-kind servers whose
    /// containers the runtime confirms stopped. Server records stay.
    pub async fn cleanup(&self) -> Vec<String> {
        let _ops = self.ops.lock().await;
        self.cleanup_inner().await
    }

    /// Stop everything and sweep containers. Shutdown path.
    pub async fn close(&self) {
        let _ops = self.ops.lock().await;

        let names: Vec<String> = {
            let servers = self.servers.read().await;
            servers.keys().cloned().collect()
        };

        for name in names {
            if let Err(e) = self.stop_inner(&name).await {
                tracing::warn!(server_name = %name, error = %e, "Failed to stop server");
            }
        }

        let cleaned = self.cleanup_inner().await;
        tracing::info!(containers = cleaned.len(), "Registry closed");
    }

    // =========================================================================
    // Internals (callers hold the ops mutex)
    // =========================================================================

    async fn start_inner(&self, name: &str) -> Result<Vec<ToolDef>, RegistryError> {
        let launch = {
            let servers = self.servers.read().await;
            let entry = servers
                .get(name)
                .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
            if entry.server.status.is_running() {
                return Err(RegistryError::AlreadyRunning(name.to_string()));
            }
            entry.server.launch.clone()
        };

        let connection: Arc<dyn ServerConnection> = match self.connector.connect(&launch).await {
            Ok(connection) => Arc::from(connection),
            Err(e) => {
                self.record_error(name, &e.to_string()).await;
                return Err(RegistryError::StartFailed(e.to_string()));
            }
        };

        let tools = match connection.list_tools().await {
            Ok(tools) => tools,
            Err(e) => {
                connection.close().await;
                let message = format!("Failed to list tools: {e}");
                self.record_error(name, &message).await;
                return Err(RegistryError::StartFailed(message));
            }
        };

        {
            let mut servers = self.servers.write().await;
            let entry = servers
                .get_mut(name)
                .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
            entry.server.status = ServerStatus::Running;
            entry.server.tools = tools.clone();
            entry.server.last_connected_at = Some(chrono::Utc::now());
            entry.connection = Some(connection);
        }

        tracing::info!(
            server_name = %name,
            tool_count = tools.len(),
            "Managed server started"
        );
        self.emitter
            .emit(BridgeEvent::server_started(name, tools.len()));
        Ok(tools)
    }

    async fn stop_inner(&self, name: &str) -> Result<(), RegistryError> {
        let (connection, kind, container) = {
            let mut servers = self.servers.write().await;
            let entry = servers
                .get_mut(name)
                .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;

            let connection = entry.connection.take();
            entry.server.status = ServerStatus::Stopped;
            entry.server.tools.clear();

            (
                connection,
                entry.server.kind,
                self.launcher.container_name(&entry.server),
            )
        };

        if let Some(connection) = connection {
            connection.close().await;
        }

        if kind == ServerKind::ContainerPackage {
            if let Err(e) = self.runtime.stop_container(&container).await {
                tracing::warn!(
                    server_name = %name,
                    container = %container,
                    error = %e,
                    "Failed to stop container"
                );
            }
        }

        tracing::info!(server_name = %name, "Managed server stopped");
        self.emitter.emit(BridgeEvent::server_stopped(name));
        Ok(())
    }

    /// Record an error status and drop any live connection.
    async fn record_error(&self, name: &str, message: &str) {
        let connection = {
            let mut servers = self.servers.write().await;
            let Some(entry) = servers.get_mut(name) else {
                return;
            };
            entry.server.status = ServerStatus::Error(message.to_string());
            entry.connection.take()
        };

        if let Some(connection) = connection {
            connection.close().await;
        }

        self.emitter.emit(BridgeEvent::server_error(name, message));
    }

    async fn demote_to_error(&self, name: &str, message: &str) {
        tracing::warn!(server_name = %name, diagnostic = message, "Status drift detected");
        self.record_error(name, message).await;
    }

    async fn cleanup_inner(&self) -> Vec<String> {
        let candidates: Vec<(String, String)> = {
            let servers = self.servers.read().await;
            servers
                .values()
                .filter(|e| {
                    e.server.kind == ServerKind::ContainerPackage
                        && e.server.status == ServerStatus::Stopped
                })
                .map(|e| (e.server.name.clone(), self.launcher.container_name(&e.server)))
                .collect()
        };

        let mut cleaned = Vec::new();
        for (name, container) in candidates {
            if self.runtime.container_status(&container).await != ContainerStatus::Stopped {
                continue;
            }
            match self.runtime.remove_container(&container).await {
                Ok(true) => cleaned.push(name),
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(
                        server_name = %name,
                        container = %container,
                        error = %e,
                        "Cleanup failed"
                    );
                }
            }
        }

        cleaned.sort();
        cleaned
    }
}

/// Best-effort ad-hoc connection check used by the orchestrator's
/// test-connection path: start, list tools, tear down.
pub(crate) async fn probe_launch(
    connector: &Arc<dyn ServerConnector>,
    launch: &toolbridge_core::LaunchSpec,
) -> Result<Vec<ToolDef>, ConnectError> {
    let connection = connector.connect(launch).await?;
    let tools = connection.list_tools().await;
    connection.close().await;
    tools
}
