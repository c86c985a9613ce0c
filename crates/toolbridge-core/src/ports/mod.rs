//! Port traits implemented by adapter crates.
//!
//! Ports express intent, not implementation detail: the registry and the
//! orchestrator only ever see these traits, which keeps process spawning,
//! the docker CLI, and HTTP clients swappable and testable.

mod connection;
mod container_runtime;
mod directory;
mod resolver;
mod tool_surface;

pub use connection::{ConnectError, ServerConnection, ServerConnector};
pub use container_runtime::{ContainerRuntime, ContainerStatus, RuntimeError};
pub use directory::{
    DirectoryApi, DirectoryError, RegistrationReceipt, ServerDescriptor, ServerSummary,
};
pub use resolver::{PackageResolver, ResolveError};
pub use tool_surface::{ToolHandler, ToolSurface, ToolSurfaceError};
