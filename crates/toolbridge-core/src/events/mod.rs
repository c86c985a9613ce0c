//! Bridge lifecycle events.
//!
//! Events describe server lifecycle transitions for embedders that want to
//! observe the bridge (a UI, an audit log). Emission is fire-and-forget;
//! the `EventEmitter` implementations own delivery.

use serde::{Deserialize, Serialize};

/// Lifecycle event emitted by the registry and orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BridgeEvent {
    /// A server record was created.
    #[serde(rename_all = "camelCase")]
    ServerInstalled { name: String, kind: String },

    /// A server reached `running` and listed its tools.
    #[serde(rename_all = "camelCase")]
    ServerStarted { name: String, tool_count: usize },

    /// A server was stopped.
    #[serde(rename_all = "camelCase")]
    ServerStopped { name: String },

    /// A server record was removed.
    #[serde(rename_all = "camelCase")]
    ServerRemoved { name: String },

    /// A server start or health check failed.
    #[serde(rename_all = "camelCase")]
    ServerError { name: String, message: String },
}

impl BridgeEvent {
    /// Create a server-installed event.
    pub fn server_installed(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self::ServerInstalled {
            name: name.into(),
            kind: kind.into(),
        }
    }

    /// Create a server-started event.
    pub fn server_started(name: impl Into<String>, tool_count: usize) -> Self {
        Self::ServerStarted {
            name: name.into(),
            tool_count,
        }
    }

    /// Create a server-stopped event.
    pub fn server_stopped(name: impl Into<String>) -> Self {
        Self::ServerStopped { name: name.into() }
    }

    /// Create a server-removed event.
    pub fn server_removed(name: impl Into<String>) -> Self {
        Self::ServerRemoved { name: name.into() }
    }

    /// Create a server-error event.
    pub fn server_error(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ServerError {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Trait for emitting bridge events.
///
/// Implementations handle transport details (channels, UI events, logs) and
/// must not block.
pub trait EventEmitter: Send + Sync {
    /// Emit an event.
    fn emit(&self, event: BridgeEvent);
}

/// A no-op emitter for tests and embedders that do not observe events.
#[derive(Debug, Clone, Default)]
pub struct NoopEmitter;

impl NoopEmitter {
    /// Create a new no-op emitter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl EventEmitter for NoopEmitter {
    fn emit(&self, _event: BridgeEvent) {
        // Intentionally do nothing
    }
}
