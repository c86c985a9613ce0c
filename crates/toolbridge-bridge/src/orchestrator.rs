//! Bridge orchestrator.
//!
//! Composition root for the bridge. Exposes three tool families to the
//! bridge's own caller: directory tools (search/register), management
//! tools (install/list/control), and the dynamically-mirrored proxy tools
//! themselves. The orchestrator's core responsibility is keeping every
//! registry transition paired with the matching tool-mirror mutation.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use toolbridge_client::{InvokeRequest, StdioConnector, ToolInvoker};
use toolbridge_core::{
    ConnectError, DirectoryApi, DirectoryError, EnvPair, EventEmitter, InstallMode, LaunchSpec,
    ManagedServer, NoopEmitter, PackageResolver, ServerConnector, ServerDescriptor, ToolCallResult,
    ToolDef, ToolSurface,
};
use toolbridge_directory::{DirectoryClient, DirectoryConfig, DirectoryResolver};
use toolbridge_docker::{DockerLauncher, DockerRuntime, LaunchOptions};

use crate::dynamic_tools::{DynamicToolRegistry, RegistryStats};
use crate::registry::{self, HealthReport, ManagedServerRegistry, RegistryError};

/// Uniform reply shape for management and directory tool calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolReply {
    /// Human-readable summary.
    pub text: String,
    /// Whether the call failed.
    pub is_error: bool,
}

impl ToolReply {
    /// Success reply.
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    /// Failure reply.
    pub fn err(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }
}

/// Control actions on a managed server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlAction {
    Start,
    Stop,
    Restart,
    Remove,
}

/// An install request as the management surface receives it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallRequest {
    /// Free-form query or explicit package name for the resolver.
    pub query: String,
    /// Local server name; derived from the package name when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Install mode; only `bridge` is handled here.
    #[serde(default)]
    pub mode: InstallMode,
    /// Environment variables for the launched server.
    #[serde(default)]
    pub env: Vec<EnvPair>,
    /// Start the server and mirror its tools right after install.
    #[serde(default = "default_auto_start")]
    pub auto_start: bool,
}

const fn default_auto_start() -> bool {
    true
}

impl InstallRequest {
    /// Request with defaults: bridge mode, auto-start, no env.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            name: None,
            mode: InstallMode::Bridge,
            env: Vec::new(),
            auto_start: true,
        }
    }

    /// Override the local server name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Add a launch environment variable.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push(EnvPair::new(key, value));
        self
    }

    /// Set auto-start.
    #[must_use]
    pub const fn with_auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = auto_start;
        self
    }
}

/// Outcome of one maintenance sweep.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepSummary {
    /// Errored servers successfully brought back to `running`.
    pub restarted: Vec<String>,
    /// Stopped containers whose resources were removed.
    pub cleaned: Vec<String>,
}

/// Everything the orchestrator composes over, for dependency injection.
pub struct OrchestratorParts {
    pub surface: Arc<dyn ToolSurface>,
    pub directory: Arc<dyn DirectoryApi>,
    pub resolver: Arc<dyn PackageResolver>,
    pub connector: Arc<dyn ServerConnector>,
    pub runtime: Arc<dyn toolbridge_core::ContainerRuntime>,
    pub emitter: Arc<dyn EventEmitter>,
    pub invoker: ToolInvoker,
}

/// The bridge's composition root.
pub struct BridgeOrchestrator {
    registry: Arc<ManagedServerRegistry>,
    mirror: DynamicToolRegistry,
    launcher: DockerLauncher,
    connector: Arc<dyn ServerConnector>,
    runtime: Arc<dyn toolbridge_core::ContainerRuntime>,
    directory: Arc<dyn DirectoryApi>,
    resolver: Arc<dyn PackageResolver>,
    invoker: ToolInvoker,
}

impl BridgeOrchestrator {
    /// Production wiring: stdio connector, docker runtime, HTTP directory
    /// client and resolver, no event observer.
    pub fn new(
        surface: Arc<dyn ToolSurface>,
        directory_config: &DirectoryConfig,
    ) -> Result<Self, DirectoryError> {
        let directory = Arc::new(DirectoryClient::new(directory_config)?);
        let resolver = Arc::new(DirectoryResolver::new(Arc::clone(&directory)));

        Ok(Self::with_parts(OrchestratorParts {
            surface,
            directory,
            resolver,
            connector: Arc::new(StdioConnector::new()),
            runtime: Arc::new(DockerRuntime::new()),
            emitter: Arc::new(NoopEmitter::new()),
            invoker: ToolInvoker::new(),
        }))
    }

    /// Explicit wiring for embedders and tests.
    pub fn with_parts(parts: OrchestratorParts) -> Self {
        let registry = Arc::new(ManagedServerRegistry::new(
            Arc::clone(&parts.connector),
            Arc::clone(&parts.runtime),
            parts.emitter,
        ));
        let mirror = DynamicToolRegistry::new(parts.surface, Arc::clone(&registry));

        Self {
            registry,
            mirror,
            launcher: DockerLauncher::new(),
            connector: parts.connector,
            runtime: parts.runtime,
            directory: parts.directory,
            resolver: parts.resolver,
            invoker: parts.invoker,
        }
    }

    // =========================================================================
    // Management tools
    // =========================================================================

    /// Resolve, install, and optionally start a package.
    pub async fn install_server(&self, request: InstallRequest) -> ToolReply {
        if request.mode == InstallMode::Direct {
            return ToolReply::err(
                "Direct install mode is handled by the client configuration editor",
            );
        }

        let resolution = match self.resolver.resolve(&request.query).await {
            Ok(resolution) => resolution,
            Err(e) => return ToolReply::err(format!("Failed to resolve package: {e}")),
        };

        let provided: Vec<String> = request.env.iter().map(|p| p.key.clone()).collect();
        let missing = resolution.missing_env(&provided);
        if !missing.is_empty() {
            return ToolReply::err(format!(
                "Package '{}' requires environment variables: {}",
                resolution.name,
                missing.join(", ")
            ));
        }

        if !self.runtime.is_available().await {
            return ToolReply::err(
                "Container runtime unavailable; cannot launch managed servers",
            );
        }

        let name = request
            .name
            .clone()
            .unwrap_or_else(|| derive_server_name(&resolution.name));

        let launch = self
            .launcher
            .build_launch_command(&resolution, &LaunchOptions::bridge(request.env.clone()));
        if !self.launcher.validate_command(&launch) {
            return ToolReply::err(format!(
                "Refusing to launch unrecognized command for package '{}'",
                resolution.name
            ));
        }

        let kind = resolution.kind;
        let server = ManagedServer::new(&name, kind, launch).with_mode(request.mode);
        if let Err(e) = self.registry.add_server(server).await {
            return ToolReply::err(e.to_string());
        }

        if !request.auto_start {
            return ToolReply::ok(format!(
                "Installed '{name}' ({}); start it with the control tool",
                kind.as_str()
            ));
        }

        match self.start_and_mirror(&name).await {
            Ok(tool_count) => ToolReply::ok(format!(
                "Installed '{name}' ({}) and started with {tool_count} tools",
                kind.as_str()
            )),
            Err(reply) => reply,
        }
    }

    /// Dispatch a control action, keeping the tool mirror in sync.
    pub async fn control_server(&self, name: &str, action: ControlAction) -> ToolReply {
        if self.registry.get_server(name).await.is_none() {
            return ToolReply::err(format!("Unknown server: {name}"));
        }

        match action {
            ControlAction::Start => match self.start_and_mirror(name).await {
                Ok(tool_count) => {
                    ToolReply::ok(format!("Started '{name}' with {tool_count} tools"))
                }
                Err(reply) => reply,
            },
            ControlAction::Stop => {
                // Registrations come down before the server leaves running.
                self.mirror.remove_server_tools(name).await;
                match self.registry.stop_server(name).await {
                    Ok(()) => ToolReply::ok(format!("Stopped '{name}'")),
                    Err(e) => ToolReply::err(format!("Failed to stop '{name}': {e}")),
                }
            }
            ControlAction::Restart => {
                self.mirror.remove_server_tools(name).await;
                match self.registry.restart_server(name).await {
                    Ok(tools) => match self.mirror.add_server_tools(name, &tools).await {
                        Ok(()) => ToolReply::ok(format!(
                            "Restarted '{name}' with {} tools",
                            tools.len()
                        )),
                        Err(e) => ToolReply::err(format!(
                            "Restarted '{name}' but failed to expose tools: {e}"
                        )),
                    },
                    Err(e) => ToolReply::err(format!("Failed to restart '{name}': {e}")),
                }
            }
            ControlAction::Remove => {
                self.mirror.remove_server_tools(name).await;
                match self.registry.remove_server_completely(name).await {
                    Ok(()) => ToolReply::ok(format!("Removed '{name}'")),
                    Err(e) => ToolReply::err(format!("Failed to remove '{name}': {e}")),
                }
            }
        }
    }

    /// One line per managed server.
    pub async fn list_servers(&self) -> ToolReply {
        let servers = self.registry.list_servers().await;
        if servers.is_empty() {
            return ToolReply::ok("No managed servers installed");
        }

        let lines: Vec<String> = servers
            .iter()
            .map(|s| {
                let status = match &s.status {
                    toolbridge_core::ServerStatus::Error(m) => format!("error ({m})"),
                    other => serde_json::to_value(other)
                        .ok()
                        .and_then(|v| v.as_str().map(ToString::to_string))
                        .unwrap_or_else(|| "unknown".to_string()),
                };
                format!(
                    "{}  {}  {}  {} tools",
                    s.name,
                    status,
                    s.kind.as_str(),
                    s.tool_count()
                )
            })
            .collect();
        ToolReply::ok(lines.join("\n"))
    }

    // =========================================================================
    // Directory tools
    // =========================================================================

    /// Search the central directory.
    pub async fn search_directory(&self, query: &str) -> ToolReply {
        match self.directory.search(query).await {
            Ok(results) if results.is_empty() => {
                ToolReply::ok(format!("No servers matched '{query}'"))
            }
            Ok(results) => {
                let lines: Vec<String> = results
                    .iter()
                    .map(|s| {
                        let location = s
                            .endpoint
                            .as_deref()
                            .or(s.package.as_deref())
                            .unwrap_or("unlisted");
                        format!(
                            "{}{}  {}  {}",
                            s.name,
                            if s.verified { " [verified]" } else { "" },
                            s.description.as_deref().unwrap_or("-"),
                            location
                        )
                    })
                    .collect();
                ToolReply::ok(lines.join("\n"))
            }
            Err(e) => ToolReply::err(format!("Directory search failed: {e}")),
        }
    }

    /// Register a server with the central directory.
    pub async fn register_server(&self, descriptor: &ServerDescriptor) -> ToolReply {
        match self.directory.register(descriptor).await {
            Ok(receipt) if receipt.accepted => ToolReply::ok(format!(
                "Registered '{}'{}",
                receipt.name,
                receipt
                    .message
                    .map(|m| format!(": {m}"))
                    .unwrap_or_default()
            )),
            Ok(receipt) => ToolReply::err(format!(
                "Registration of '{}' rejected{}",
                receipt.name,
                receipt
                    .message
                    .map(|m| format!(": {m}"))
                    .unwrap_or_default()
            )),
            Err(e) => ToolReply::err(format!("Directory registration failed: {e}")),
        }
    }

    // =========================================================================
    // Ad-hoc proxying
    // =========================================================================

    /// Call a tool on an arbitrary remote endpoint, reusing cached
    /// connections with transport fallback. Never returns an error shape
    /// other than the uniform error result.
    pub async fn invoke_remote_tool(&self, request: InvokeRequest) -> ToolCallResult {
        self.invoker.invoke(request).await
    }

    /// Start, list tools, and tear down a candidate launch spec without
    /// touching the registry.
    pub async fn test_connection(&self, spec: &LaunchSpec) -> Result<Vec<ToolDef>, ConnectError> {
        registry::probe_launch(&self.connector, spec).await
    }

    // =========================================================================
    // Maintenance and shutdown
    // =========================================================================

    /// Auto-restart errored servers, refresh their mirrored tools, and
    /// sweep stopped containers. Externally triggered.
    pub async fn maintenance_sweep(&self) -> SweepSummary {
        let restarted = self.registry.auto_restart().await;

        for name in &restarted {
            let Some(server) = self.registry.get_server(name).await else {
                continue;
            };
            if let Err(e) = self.mirror.refresh_server_tools(name, &server.tools).await {
                tracing::warn!(server_name = %name, error = %e, "Tool refresh failed after restart");
            }
        }

        let cleaned = self.registry.cleanup().await;
        tracing::info!(
            restarted = restarted.len(),
            cleaned = cleaned.len(),
            "Maintenance sweep finished"
        );

        SweepSummary { restarted, cleaned }
    }

    /// Per-server health, reconciled against the container runtime.
    pub async fn server_health(
        &self,
        name: &str,
    ) -> Result<crate::registry::ServerHealth, RegistryError> {
        self.registry.server_health(name).await
    }

    /// Health classification across all servers.
    pub async fn health_check_all(&self) -> HealthReport {
        self.registry.health_check_all().await
    }

    /// Mirror statistics.
    pub async fn tool_stats(&self) -> RegistryStats {
        self.mirror.stats().await
    }

    /// Mirror state dump.
    pub async fn export_tool_state(&self) -> std::collections::HashMap<String, Vec<String>> {
        self.mirror.export_state().await
    }

    /// Snapshot of all managed servers.
    pub async fn servers(&self) -> Vec<ManagedServer> {
        self.registry.list_servers().await
    }

    /// Graceful shutdown: drain the invoker's connections, stop every
    /// managed server, sweep containers, and tear the mirror down.
    pub async fn shutdown(&self) {
        self.invoker.close().await;
        self.mirror.clear_all().await;
        self.registry.close().await;
        tracing::info!("Bridge orchestrator shut down");
    }

    async fn start_and_mirror(&self, name: &str) -> Result<usize, ToolReply> {
        let tools = self
            .registry
            .start_server(name)
            .await
            .map_err(|e| ToolReply::err(format!("Failed to start '{name}': {e}")))?;

        self.mirror
            .add_server_tools(name, &tools)
            .await
            .map_err(|e| {
                ToolReply::err(format!("Started '{name}' but failed to expose tools: {e}"))
            })?;
        Ok(tools.len())
    }
}

/// Derive a local server name from a package name: lowercase, non
/// alphanumerics collapsed to dashes.
fn derive_server_name(package_name: &str) -> String {
    let mut out = String::with_capacity(package_name.len());
    let mut last_dash = true;
    for c in package_name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    out.trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        FakeConnector, FakeDirectory, FakeResolver, FakeRuntime, InMemorySurface,
    };
    use serde_json::json;
    use toolbridge_core::{
        ContainerRuntime, PackageResolution, ServerKind, ServerStatus, ServerSummary,
    };

    struct Harness {
        orchestrator: BridgeOrchestrator,
        surface: Arc<InMemorySurface>,
        connector: Arc<FakeConnector>,
        runtime: Arc<FakeRuntime>,
    }

    fn harness(connector: Arc<FakeConnector>, resolver: Arc<FakeResolver>) -> Harness {
        let surface = InMemorySurface::new();
        let runtime = FakeRuntime::empty();
        let orchestrator = BridgeOrchestrator::with_parts(OrchestratorParts {
            surface: Arc::clone(&surface) as Arc<dyn ToolSurface>,
            directory: FakeDirectory::empty() as Arc<dyn DirectoryApi>,
            resolver: resolver as Arc<dyn PackageResolver>,
            connector: Arc::clone(&connector) as Arc<dyn ServerConnector>,
            runtime: Arc::clone(&runtime) as Arc<dyn ContainerRuntime>,
            emitter: Arc::new(NoopEmitter::new()),
            invoker: ToolInvoker::new(),
        });
        Harness {
            orchestrator,
            surface,
            connector,
            runtime,
        }
    }

    fn weather_resolution() -> PackageResolution {
        PackageResolution::new(
            "weather",
            ServerKind::ProcessPackage,
            "@example/weather-tools",
        )
    }

    #[tokio::test]
    async fn test_install_with_auto_start_mirrors_tools() {
        let h = harness(
            FakeConnector::with_tools(vec!["forecast", "alerts"]),
            FakeResolver::with_resolution(weather_resolution()),
        );

        let reply = h.orchestrator.install_server(InstallRequest::new("weather")).await;
        assert!(!reply.is_error, "{}", reply.text);
        assert!(reply.text.contains("2 tools"));

        let server = h.orchestrator.servers().await.pop().unwrap();
        assert_eq!(server.name, "weather");
        assert_eq!(server.status, ServerStatus::Running);

        assert_eq!(h.surface.names(), vec!["weather_alerts", "weather_forecast"]);

        let stats = h.orchestrator.tool_stats().await;
        assert_eq!(stats.total_servers, 1);
        assert_eq!(stats.total_tools, 2);
    }

    #[tokio::test]
    async fn test_stop_unregisters_tools() {
        let h = harness(
            FakeConnector::with_tools(vec!["forecast", "alerts"]),
            FakeResolver::with_resolution(weather_resolution()),
        );
        h.orchestrator.install_server(InstallRequest::new("weather")).await;

        let reply = h
            .orchestrator
            .control_server("weather", ControlAction::Stop)
            .await;
        assert!(!reply.is_error);

        let server = h.orchestrator.servers().await.pop().unwrap();
        assert_eq!(server.status, ServerStatus::Stopped);
        assert!(h.surface.names().is_empty());
        assert_eq!(h.orchestrator.tool_stats().await.total_tools, 0);
    }

    #[tokio::test]
    async fn test_control_unknown_server_is_error_without_mutation() {
        let h = harness(
            FakeConnector::with_tools(vec!["forecast"]),
            FakeResolver::with_resolution(weather_resolution()),
        );
        h.orchestrator.install_server(InstallRequest::new("weather")).await;
        let before = h.orchestrator.servers().await;

        for action in [
            ControlAction::Start,
            ControlAction::Stop,
            ControlAction::Restart,
            ControlAction::Remove,
        ] {
            let reply = h.orchestrator.control_server("ghost", action).await;
            assert!(reply.is_error);
            assert!(reply.text.contains("ghost"));
        }

        let after = h.orchestrator.servers().await;
        assert_eq!(before.len(), after.len());
        assert_eq!(after[0].status, ServerStatus::Running);
    }

    #[tokio::test]
    async fn test_restart_produces_fresh_registrations() {
        let h = harness(
            FakeConnector::with_tools(vec!["forecast", "alerts"]),
            FakeResolver::with_resolution(weather_resolution()),
        );
        h.orchestrator.install_server(InstallRequest::new("weather")).await;

        let reply = h
            .orchestrator
            .control_server("weather", ControlAction::Restart)
            .await;
        assert!(!reply.is_error, "{}", reply.text);

        assert_eq!(h.surface.names(), vec!["weather_alerts", "weather_forecast"]);
        assert_eq!(h.connector.connections_created(), 2);
        assert_eq!(h.connector.closed_connections(), 1);
    }

    #[tokio::test]
    async fn test_remove_deletes_server_and_tools() {
        let h = harness(
            FakeConnector::with_tools(vec!["forecast"]),
            FakeResolver::with_resolution(weather_resolution()),
        );
        h.orchestrator.install_server(InstallRequest::new("weather")).await;

        let reply = h
            .orchestrator
            .control_server("weather", ControlAction::Remove)
            .await;
        assert!(!reply.is_error);
        assert!(h.orchestrator.servers().await.is_empty());
        assert!(h.surface.names().is_empty());
    }

    #[tokio::test]
    async fn test_proxied_call_flows_to_downstream() {
        let h = harness(
            FakeConnector::with_tools(vec!["forecast"]),
            FakeResolver::with_resolution(weather_resolution()),
        );
        h.orchestrator.install_server(InstallRequest::new("weather")).await;

        let result = h
            .surface
            .call("weather_forecast", json!({"city": "Osaka"}))
            .await
            .unwrap();
        assert!(!result.is_error);

        let calls = h.connector.calls();
        assert_eq!(calls, vec![("forecast".to_string(), json!({"city": "Osaka"}))]);
    }

    #[tokio::test]
    async fn test_install_duplicate_name_is_conflict() {
        let h = harness(
            FakeConnector::with_tools(vec!["forecast"]),
            FakeResolver::with_resolution(weather_resolution()),
        );
        h.orchestrator.install_server(InstallRequest::new("weather")).await;

        let reply = h
            .orchestrator
            .install_server(InstallRequest::new("weather").with_auto_start(false))
            .await;
        assert!(reply.is_error);
        assert!(reply.text.contains("already exists"));
    }

    #[tokio::test]
    async fn test_install_missing_required_env_fails() {
        let resolution = weather_resolution()
            .with_required_env(vec!["API_KEY".to_string(), "REGION".to_string()]);
        let h = harness(
            FakeConnector::with_tools(vec!["forecast"]),
            FakeResolver::with_resolution(resolution),
        );

        let reply = h
            .orchestrator
            .install_server(InstallRequest::new("weather").with_env("API_KEY", "k"))
            .await;
        assert!(reply.is_error);
        assert!(reply.text.contains("REGION"));
        assert!(h.orchestrator.servers().await.is_empty());
    }

    #[tokio::test]
    async fn test_install_direct_mode_is_rejected() {
        let h = harness(
            FakeConnector::with_tools(vec!["forecast"]),
            FakeResolver::with_resolution(weather_resolution()),
        );

        let mut request = InstallRequest::new("weather");
        request.mode = InstallMode::Direct;
        let reply = h.orchestrator.install_server(request).await;
        assert!(reply.is_error);
        assert!(h.orchestrator.servers().await.is_empty());
    }

    #[tokio::test]
    async fn test_install_unresolvable_package_fails() {
        let h = harness(
            FakeConnector::with_tools(vec![]),
            FakeResolver::unresolvable(),
        );
        let reply = h.orchestrator.install_server(InstallRequest::new("ghost")).await;
        assert!(reply.is_error);
        assert!(reply.text.contains("ghost"));
    }

    #[tokio::test]
    async fn test_sweep_revives_errored_server_and_refreshes_mirror() {
        let connector = FakeConnector::with_tools(vec!["forecast"]);
        connector.fail_next_connect("cold start");
        let h = harness(
            Arc::clone(&connector),
            FakeResolver::with_resolution(weather_resolution()),
        );

        let reply = h.orchestrator.install_server(InstallRequest::new("weather")).await;
        assert!(reply.is_error); // first start failed
        assert!(h.surface.names().is_empty());

        let summary = h.orchestrator.maintenance_sweep().await;
        assert_eq!(summary.restarted, vec!["weather".to_string()]);

        let server = h.orchestrator.servers().await.pop().unwrap();
        assert_eq!(server.status, ServerStatus::Running);
        assert_eq!(h.surface.names(), vec!["weather_forecast"]);
    }

    #[tokio::test]
    async fn test_shutdown_stops_servers_and_clears_mirror() {
        let h = harness(
            FakeConnector::with_tools(vec!["forecast"]),
            FakeResolver::with_resolution(weather_resolution()),
        );
        h.orchestrator.install_server(InstallRequest::new("weather")).await;

        h.orchestrator.shutdown().await;

        assert!(h.surface.names().is_empty());
        let server = h.orchestrator.servers().await.pop().unwrap();
        assert_eq!(server.status, ServerStatus::Stopped);
        assert_eq!(h.connector.closed_connections(), 1);
    }

    #[tokio::test]
    async fn test_list_servers_summarizes() {
        let h = harness(
            FakeConnector::with_tools(vec!["forecast", "alerts"]),
            FakeResolver::with_resolution(weather_resolution()),
        );
        h.orchestrator.install_server(InstallRequest::new("weather")).await;

        let reply = h.orchestrator.list_servers().await;
        assert!(!reply.is_error);
        assert!(reply.text.contains("weather"));
        assert!(reply.text.contains("running"));
        assert!(reply.text.contains("2 tools"));
    }

    #[tokio::test]
    async fn test_search_directory_formats_results() {
        let surface = InMemorySurface::new();
        let directory = FakeDirectory::with_summaries(vec![ServerSummary {
            name: "weather".to_string(),
            description: Some("Weather tools".to_string()),
            endpoint: None,
            package: Some("@example/weather-tools".to_string()),
            verified: true,
        }]);
        let orchestrator = BridgeOrchestrator::with_parts(OrchestratorParts {
            surface: surface as Arc<dyn ToolSurface>,
            directory: directory as Arc<dyn DirectoryApi>,
            resolver: FakeResolver::unresolvable() as Arc<dyn PackageResolver>,
            connector: FakeConnector::with_tools(vec![]) as Arc<dyn ServerConnector>,
            runtime: FakeRuntime::empty() as Arc<dyn ContainerRuntime>,
            emitter: Arc::new(NoopEmitter::new()),
            invoker: ToolInvoker::new(),
        });

        let reply = orchestrator.search_directory("weather").await;
        assert!(!reply.is_error);
        assert!(reply.text.contains("weather [verified]"));
        assert!(reply.text.contains("@example/weather-tools"));

        let reply = orchestrator.search_directory("nothing-here").await;
        assert!(reply.text.contains("No servers matched"));
    }

    #[tokio::test]
    async fn test_connection_probe_does_not_touch_registry() {
        let h = harness(
            FakeConnector::with_tools(vec!["forecast"]),
            FakeResolver::with_resolution(weather_resolution()),
        );

        let spec = LaunchSpec::new("docker", vec!["run".to_string(), "img".to_string()]);
        let tools = h.orchestrator.test_connection(&spec).await.unwrap();
        assert_eq!(tools.len(), 1);

        assert!(h.orchestrator.servers().await.is_empty());
        assert_eq!(h.connector.closed_connections(), 1);
    }

    #[tokio::test]
    async fn test_container_drift_surfaces_in_health() {
        let resolution =
            PackageResolution::new("files", ServerKind::ContainerPackage, "example/files:latest");
        let h = harness(
            FakeConnector::with_tools(vec!["ls"]),
            FakeResolver::with_resolution(resolution),
        );
        h.orchestrator.install_server(InstallRequest::new("files")).await;

        // FakeRuntime reports NotFound for the container behind this
        // server, contradicting the registry's Running status.
        let health = h.orchestrator.server_health("files").await.unwrap();
        assert!(health.status.is_error());
        assert_eq!(health.diagnostic.as_deref(), Some("Container not running"));

        let report = h.orchestrator.health_check_all().await;
        assert_eq!(report.unhealthy.len(), 1);

        // Once the runtime confirms the container, a fresh start is clean.
        let server = h.orchestrator.servers().await.pop().unwrap();
        let container = DockerLauncher::new().container_name(&server);
        h.runtime.set_status(&container, toolbridge_core::ContainerStatus::Running);

        let sweep = h.orchestrator.maintenance_sweep().await;
        assert_eq!(sweep.restarted, vec!["files".to_string()]);

        // The restarted container is up again at the runtime level.
        h.runtime.set_status(&container, toolbridge_core::ContainerStatus::Running);
        let health = h.orchestrator.server_health("files").await.unwrap();
        assert_eq!(health.status, ServerStatus::Running);
    }

    #[test]
    fn test_derive_server_name() {
        assert_eq!(derive_server_name("@example/weather-tools"), "example-weather-tools");
        assert_eq!(derive_server_name("Files.Server"), "files-server");
        assert_eq!(derive_server_name("plain"), "plain");
    }

    #[test]
    fn test_control_action_wire_names() {
        let json = serde_json::to_string(&ControlAction::Restart).unwrap();
        assert_eq!(json, "\"restart\"");
        let action: ControlAction = serde_json::from_str("\"stop\"").unwrap();
        assert_eq!(action, ControlAction::Stop);
    }
}
