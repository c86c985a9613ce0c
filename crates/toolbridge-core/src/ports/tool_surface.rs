//! Host tool-serving surface port.
//!
//! The bridge advertises its own callable tools through this surface. The
//! dynamic tool registry adds and removes proxy tools here at runtime; the
//! host runtime (whatever serves the bridge's own protocol endpoint) owns
//! the actual wire exposure.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::domain::{ToolCallResult, ToolDef};

/// Errors from tool surface mutations.
#[derive(Debug, Error)]
pub enum ToolSurfaceError {
    #[error("Tool already registered: {0}")]
    Duplicate(String),

    #[error("Tool not registered: {0}")]
    NotRegistered(String),

    #[error("Tool surface rejected registration: {0}")]
    Rejected(String),
}

/// Handler invoked when a dynamically-registered tool is called.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Handle a call with the caller's JSON arguments.
    async fn call(&self, arguments: Value) -> ToolCallResult;
}

/// A mutable mapping from tool names to handlers, supporting add/remove
/// after startup.
pub trait ToolSurface: Send + Sync {
    /// Register a tool under `tool.name`. Duplicate names are rejected.
    fn add_tool(&self, tool: ToolDef, handler: Arc<dyn ToolHandler>)
    -> Result<(), ToolSurfaceError>;

    /// Unregister a tool by name.
    fn remove_tool(&self, name: &str) -> Result<(), ToolSurfaceError>;
}
