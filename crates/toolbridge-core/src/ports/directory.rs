//! Central discovery directory port.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from directory API calls.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Directory request failed with status {status}: {url}")]
    RequestFailed { status: u16, url: String },

    #[error("Network error reaching directory: {0}")]
    Network(String),

    #[error("Invalid directory response: {0}")]
    InvalidResponse(String),
}

/// One server entry returned by a directory search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSummary {
    /// Registered server name.
    pub name: String,

    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Remote endpoint, when the server is directly reachable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Installable package name, when the server can be run locally.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,

    /// Whether the directory has verified this entry.
    #[serde(default)]
    pub verified: bool,
}

/// Registration payload sent to the directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerDescriptor {
    /// Name to register under.
    pub name: String,

    /// Public endpoint of the server.
    pub endpoint: String,

    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Advertised capability tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<String>,
}

/// Outcome of a registration call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationReceipt {
    /// Name the directory recorded.
    pub name: String,

    /// Whether the registration was accepted.
    pub accepted: bool,

    /// Directory-provided message (pending verification, rejection reason).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Client surface of the central discovery directory.
///
/// The bridge is a plain consumer: failures are ordinary errors surfaced to
/// the caller, with no retry policy beyond what the transport applies.
#[async_trait]
pub trait DirectoryApi: Send + Sync {
    /// Search the directory for servers matching a free-form query.
    async fn search(&self, query: &str) -> Result<Vec<ServerSummary>, DirectoryError>;

    /// Register a server with the directory.
    async fn register(
        &self,
        descriptor: &ServerDescriptor,
    ) -> Result<RegistrationReceipt, DirectoryError>;
}
