//! Managed-server registry, dynamic tool mirror, and bridge orchestrator.
//!
//! This crate composes the rest of the workspace into the bridge itself:
//! the registry owns server lifecycles, the mirror projects their tools
//! onto the host surface, and the orchestrator keeps the two in lockstep
//! while exposing the management and directory tool families.

mod dynamic_tools;
mod orchestrator;
mod registry;

#[cfg(test)]
pub(crate) mod testing;

pub use dynamic_tools::{DynamicToolRegistry, RegistryStats};
pub use orchestrator::{
    BridgeOrchestrator, ControlAction, InstallRequest, OrchestratorParts, SweepSummary, ToolReply,
};
pub use registry::{
    HealthIssue, HealthReport, ManagedServerRegistry, RegistryError, ServerHealth,
};

// Re-export the request type callers need for ad-hoc proxying
pub use toolbridge_client::InvokeRequest;
