//! Shared fakes for this crate's tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use toolbridge_core::{
    BridgeEvent, ConnectError, ContainerRuntime, ContainerStatus, EventEmitter, LaunchSpec,
    ManagedServer, RuntimeError, ServerConnection, ServerConnector, ServerKind, ToolCallResult,
    ToolDef, ToolHandler, ToolSurface, ToolSurfaceError,
};

/// A server record with a plausible launch spec.
pub fn fake_server(name: &str) -> ManagedServer {
    fake_server_of_kind(name, ServerKind::ProcessPackage)
}

pub fn fake_server_of_kind(name: &str, kind: ServerKind) -> ManagedServer {
    let launch = LaunchSpec::new(
        "docker",
        vec![
            "run".to_string(),
            "-i".to_string(),
            "--rm".to_string(),
            "--name".to_string(),
            format!("toolbridge-{name}-0000000000"),
            format!("example/{name}:latest"),
        ],
    );
    ManagedServer::new(name, kind, launch)
}

// ============================================================================
// Connector / connection
// ============================================================================

/// Connection whose tool list and behavior come from the parent connector.
pub struct FakeConnection {
    tools: Vec<ToolDef>,
    closed: Arc<AtomicUsize>,
    calls: Arc<Mutex<Vec<(String, Value)>>>,
}

#[async_trait]
impl ServerConnection for FakeConnection {
    async fn list_tools(&self) -> Result<Vec<ToolDef>, ConnectError> {
        Ok(self.tools.clone())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolCallResult, ConnectError> {
        self.calls
            .lock()
            .unwrap()
            .push((name.to_string(), arguments));
        Ok(ToolCallResult::text(format!("{name} ran")))
    }

    async fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Connector handing out `FakeConnection`s, with failure injection and
/// creation/close counters.
pub struct FakeConnector {
    tools: Vec<ToolDef>,
    fail_always: Mutex<Option<String>>,
    fail_next: Mutex<Option<String>>,
    created: AtomicUsize,
    closed: Arc<AtomicUsize>,
    calls: Arc<Mutex<Vec<(String, Value)>>>,
}

impl FakeConnector {
    pub fn with_tools(names: Vec<&str>) -> Arc<Self> {
        Arc::new(Self {
            tools: names.into_iter().map(ToolDef::new).collect(),
            fail_always: Mutex::new(None),
            fail_next: Mutex::new(None),
            created: AtomicUsize::new(0),
            closed: Arc::new(AtomicUsize::new(0)),
            calls: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        let connector = Self::with_tools(vec![]);
        *connector.fail_always.lock().unwrap() = Some(message.to_string());
        connector
    }

    /// Fail only the next connect attempt.
    pub fn fail_next_connect(&self, message: &str) {
        *self.fail_next.lock().unwrap() = Some(message.to_string());
    }

    pub fn connections_created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn closed_connections(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Tool calls observed across all connections, in order.
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ServerConnector for FakeConnector {
    async fn connect(&self, _spec: &LaunchSpec) -> Result<Box<dyn ServerConnection>, ConnectError> {
        if let Some(message) = self.fail_next.lock().unwrap().take() {
            return Err(ConnectError::SpawnFailed(message));
        }
        if let Some(message) = self.fail_always.lock().unwrap().clone() {
            return Err(ConnectError::SpawnFailed(message));
        }

        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeConnection {
            tools: self.tools.clone(),
            closed: Arc::clone(&self.closed),
            calls: Arc::clone(&self.calls),
        }))
    }
}

// ============================================================================
// Container runtime
// ============================================================================

/// In-memory container runtime. Unknown containers report `NotFound`.
pub struct FakeRuntime {
    statuses: Mutex<HashMap<String, ContainerStatus>>,
    removed: Mutex<Vec<String>>,
}

impl FakeRuntime {
    pub fn empty() -> Arc<Self> {
        Arc::new(Self {
            statuses: Mutex::new(HashMap::new()),
            removed: Mutex::new(Vec::new()),
        })
    }

    pub fn set_status(&self, name: &str, status: ContainerStatus) {
        self.statuses
            .lock()
            .unwrap()
            .insert(name.to_string(), status);
    }

    pub fn removed(&self) -> Vec<String> {
        self.removed.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn is_available(&self) -> bool {
        true
    }

    async fn container_status(&self, name: &str) -> ContainerStatus {
        self.statuses
            .lock()
            .unwrap()
            .get(name)
            .copied()
            .unwrap_or(ContainerStatus::NotFound)
    }

    async fn stop_container(&self, name: &str) -> Result<bool, RuntimeError> {
        let mut statuses = self.statuses.lock().unwrap();
        match statuses.get(name) {
            Some(ContainerStatus::Running) => {
                statuses.insert(name.to_string(), ContainerStatus::Stopped);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn remove_container(&self, name: &str) -> Result<bool, RuntimeError> {
        let existed = self
            .statuses
            .lock()
            .unwrap()
            .remove(name)
            .is_some();
        if existed {
            self.removed.lock().unwrap().push(name.to_string());
        }
        Ok(existed)
    }

    async fn container_logs(&self, _name: &str, _lines: u32) -> Option<String> {
        None
    }
}

// ============================================================================
// Tool surface
// ============================================================================

/// In-memory tool surface mirroring what a host runtime would expose.
pub struct InMemorySurface {
    tools: Mutex<HashMap<String, Arc<dyn ToolHandler>>>,
}

impl InMemorySurface {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            tools: Mutex::new(HashMap::new()),
        })
    }

    /// Registered tool names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.lock().unwrap().keys().cloned().collect();
        names.sort();
        names
    }

    /// Invoke a registered handler the way a host caller would.
    pub async fn call(&self, name: &str, arguments: Value) -> Option<ToolCallResult> {
        let handler = self.tools.lock().unwrap().get(name).map(Arc::clone)?;
        Some(handler.call(arguments).await)
    }
}

impl ToolSurface for InMemorySurface {
    fn add_tool(
        &self,
        tool: ToolDef,
        handler: Arc<dyn ToolHandler>,
    ) -> Result<(), ToolSurfaceError> {
        let mut tools = self.tools.lock().unwrap();
        if tools.contains_key(&tool.name) {
            return Err(ToolSurfaceError::Duplicate(tool.name));
        }
        tools.insert(tool.name, handler);
        Ok(())
    }

    fn remove_tool(&self, name: &str) -> Result<(), ToolSurfaceError> {
        self.tools
            .lock()
            .unwrap()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ToolSurfaceError::NotRegistered(name.to_string()))
    }
}

// ============================================================================
// Directory / resolver
// ============================================================================

use toolbridge_core::{
    DirectoryApi, DirectoryError, PackageResolution, PackageResolver, RegistrationReceipt,
    ResolveError, ServerDescriptor, ServerSummary,
};

/// Directory stub answering from canned summaries.
pub struct FakeDirectory {
    pub summaries: Vec<ServerSummary>,
}

impl FakeDirectory {
    pub fn empty() -> Arc<Self> {
        Arc::new(Self {
            summaries: Vec::new(),
        })
    }

    pub fn with_summaries(summaries: Vec<ServerSummary>) -> Arc<Self> {
        Arc::new(Self { summaries })
    }
}

#[async_trait]
impl DirectoryApi for FakeDirectory {
    async fn search(&self, query: &str) -> Result<Vec<ServerSummary>, DirectoryError> {
        Ok(self
            .summaries
            .iter()
            .filter(|s| s.name.contains(query))
            .cloned()
            .collect())
    }

    async fn register(
        &self,
        descriptor: &ServerDescriptor,
    ) -> Result<RegistrationReceipt, DirectoryError> {
        Ok(RegistrationReceipt {
            name: descriptor.name.clone(),
            accepted: true,
            message: Some("pending verification".to_string()),
        })
    }
}

/// Resolver stub returning one canned resolution.
pub struct FakeResolver {
    resolution: Option<PackageResolution>,
}

impl FakeResolver {
    pub fn with_resolution(resolution: PackageResolution) -> Arc<Self> {
        Arc::new(Self {
            resolution: Some(resolution),
        })
    }

    pub fn unresolvable() -> Arc<Self> {
        Arc::new(Self { resolution: None })
    }
}

#[async_trait]
impl PackageResolver for FakeResolver {
    async fn resolve(&self, query: &str) -> Result<PackageResolution, ResolveError> {
        self.resolution
            .clone()
            .ok_or_else(|| ResolveError::NotFound(query.to_string()))
    }
}

// ============================================================================
// Events
// ============================================================================

struct RecordingEmitter {
    events: Arc<Mutex<Vec<BridgeEvent>>>,
}

impl EventEmitter for RecordingEmitter {
    fn emit(&self, event: BridgeEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// An emitter that records everything, plus the shared record.
pub fn recording_emitter() -> (Arc<dyn EventEmitter>, Arc<Mutex<Vec<BridgeEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    (
        Arc::new(RecordingEmitter {
            events: Arc::clone(&events),
        }),
        events,
    )
}
