//! Managed-server domain types.
//!
//! A `ManagedServer` is a downstream tool server whose process or container
//! lifecycle is owned by the bridge. The registry in `toolbridge-bridge` is
//! the single authority for these records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a managed server was packaged and launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServerKind {
    /// Runs a registry package through an interpreter wrapper (npx inside
    /// a hardened container).
    ProcessPackage,
    /// Runs a container image directly.
    ContainerPackage,
}

impl ServerKind {
    /// Wire/display label, matching the serde representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ProcessPackage => "process-package",
            Self::ContainerPackage => "container-package",
        }
    }
}

/// How the installed server's tools are exposed to the client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallMode {
    /// Tools are proxied dynamically through the bridge.
    #[default]
    Bridge,
    /// The client's own config file is edited to point at the server.
    /// Handled by an external collaborator; the bridge rejects it.
    Direct,
}

/// Runtime status of a managed server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    /// Record exists but the server has never been started.
    #[default]
    Installing,
    /// Server is running and connected.
    Running,
    /// Server was stopped explicitly.
    Stopped,
    /// Start or health check failed.
    Error(String),
}

impl ServerStatus {
    /// Whether this status is `Running`.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Whether this status is `Error`.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// Environment variable entry for a server launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvPair {
    /// Environment variable key.
    pub key: String,
    /// Environment variable value.
    pub value: String,
}

impl EnvPair {
    /// Create a new environment variable entry.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Resolved command line needed to start a server.
///
/// Produced by the container launcher (or a package resolver) and treated
/// as opaque by the registry: the registry hands it to a `ServerConnector`
/// and never interprets the tokens itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchSpec {
    /// Executable to run (e.g. "docker").
    pub command: String,
    /// Arguments to pass to the executable.
    pub args: Vec<String>,
    /// Environment variables for the child process.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvPair>,
}

impl LaunchSpec {
    /// Create a launch spec from a command and its arguments.
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            env: Vec::new(),
        }
    }

    /// Add an environment variable.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push(EnvPair::new(key, value));
        self
    }

    /// The full command line as a single token list.
    #[must_use]
    pub fn command_line(&self) -> Vec<String> {
        let mut line = Vec::with_capacity(1 + self.args.len());
        line.push(self.command.clone());
        line.extend(self.args.iter().cloned());
        line
    }
}

/// A locally-installed tool server owned by the bridge.
///
/// The live connection is deliberately not part of this record: it is held
/// by the registry entry and exists if and only if `status` is `Running`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagedServer {
    /// Unique local name, immutable for the server's lifetime.
    pub name: String,

    /// How the server was packaged and launched.
    pub kind: ServerKind,

    /// How the server's tools are exposed.
    pub mode: InstallMode,

    /// Resolved command line used to start the server.
    pub launch: LaunchSpec,

    /// Current lifecycle status.
    pub status: ServerStatus,

    /// Tools discovered on the last successful start; cleared on stop.
    #[serde(default)]
    pub tools: Vec<super::ToolDef>,

    /// When the server record was created.
    pub created_at: DateTime<Utc>,

    /// Last successful connection time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_connected_at: Option<DateTime<Utc>>,
}

impl ManagedServer {
    /// Create a new record in the `Installing` state.
    pub fn new(name: impl Into<String>, kind: ServerKind, launch: LaunchSpec) -> Self {
        Self {
            name: name.into(),
            kind,
            mode: InstallMode::Bridge,
            launch,
            status: ServerStatus::Installing,
            tools: Vec::new(),
            created_at: Utc::now(),
            last_connected_at: None,
        }
    }

    /// Set the install mode.
    #[must_use]
    pub const fn with_mode(mut self, mode: InstallMode) -> Self {
        self.mode = mode;
        self
    }

    /// Number of tools discovered on the last start.
    #[must_use]
    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_server_starts_installing() {
        let launch = LaunchSpec::new("docker", vec!["run".to_string()]);
        let server = ManagedServer::new("weather", ServerKind::ContainerPackage, launch);

        assert_eq!(server.name, "weather");
        assert_eq!(server.status, ServerStatus::Installing);
        assert_eq!(server.mode, InstallMode::Bridge);
        assert!(server.tools.is_empty());
        assert!(server.last_connected_at.is_none());
    }

    #[test]
    fn test_status_predicates() {
        assert!(ServerStatus::Running.is_running());
        assert!(!ServerStatus::Stopped.is_running());
        assert!(ServerStatus::Error("boom".to_string()).is_error());
        assert!(!ServerStatus::Installing.is_error());
    }

    #[test]
    fn test_kind_serialization() {
        let json = serde_json::to_string(&ServerKind::ProcessPackage).unwrap();
        assert_eq!(json, "\"process-package\"");
        let json = serde_json::to_string(&ServerKind::ContainerPackage).unwrap();
        assert_eq!(json, "\"container-package\"");
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&ServerStatus::Running).unwrap();
        assert_eq!(json, "\"running\"");
        let json = serde_json::to_string(&ServerStatus::Error("no image".to_string())).unwrap();
        assert_eq!(json, "{\"error\":\"no image\"}");
    }

    #[test]
    fn test_launch_spec_command_line() {
        let launch = LaunchSpec::new("docker", vec!["run".to_string(), "-i".to_string()])
            .with_env("API_KEY", "secret");

        assert_eq!(launch.command_line(), vec!["docker", "run", "-i"]);
        assert_eq!(launch.env.len(), 1);
        assert_eq!(launch.env[0].key, "API_KEY");
    }
}
