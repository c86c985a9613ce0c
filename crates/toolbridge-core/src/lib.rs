//! Core domain types and port definitions for toolbridge.
//!
//! This crate holds everything the other workspace crates agree on: the
//! managed-server domain model, the tool call shapes, and the port traits
//! that adapters (docker launcher, protocol clients, directory client,
//! host tool surface) implement. No adapter-specific dependencies live
//! here.

pub mod domain;
pub mod events;
pub mod ports;

// Re-export commonly used types for convenience
pub use domain::{
    EnvPair, InstallMode, LaunchSpec, ManagedServer, PackageInstructions, PackageResolution,
    ServerKind, ServerStatus, ToolCallResult, ToolContent, ToolDef,
};
pub use events::{BridgeEvent, EventEmitter, NoopEmitter};
pub use ports::{
    ConnectError, ContainerRuntime, ContainerStatus, DirectoryApi, DirectoryError,
    PackageResolver, RegistrationReceipt, ResolveError, RuntimeError, ServerConnection,
    ServerConnector, ServerDescriptor, ServerSummary, ToolHandler, ToolSurface, ToolSurfaceError,
};
