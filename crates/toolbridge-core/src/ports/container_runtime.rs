//! Container runtime port.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from container runtime control operations.
///
/// Only structural failures surface here (the control command itself could
/// not run). Missing containers are not errors; see `ContainerStatus`.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Failed to run container command: {0}")]
    Io(#[from] std::io::Error),

    #[error("Container command failed: {0}")]
    CommandFailed(String),
}

/// Observed state of a container at the runtime level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerStatus {
    /// Container exists and is running.
    Running,
    /// Container exists but is not running.
    Stopped,
    /// No container with that name exists.
    NotFound,
}

/// Queries and mutates container state for container-kind servers.
///
/// Implementations must be drift-tolerant: status queries never raise for
/// missing containers, and stop/remove are idempotent.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Best-effort probe for the runtime itself. Failures are reported as
    /// unavailable, never raised.
    async fn is_available(&self) -> bool;

    /// Three-state container status query.
    async fn container_status(&self, name: &str) -> ContainerStatus;

    /// Stop a container. Returns `Ok(false)` if there was nothing to stop.
    async fn stop_container(&self, name: &str) -> Result<bool, RuntimeError>;

    /// Remove a container. Returns `Ok(false)` if there was nothing to
    /// remove.
    async fn remove_container(&self, name: &str) -> Result<bool, RuntimeError>;

    /// Tail of the container's logs, for diagnostics only. `None` when
    /// logs cannot be fetched.
    async fn container_logs(&self, name: &str, lines: u32) -> Option<String>;
}
