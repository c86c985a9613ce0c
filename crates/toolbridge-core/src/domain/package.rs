//! Resolved package descriptors.
//!
//! A `PackageResolution` is produced by an external resolver (see
//! `ports::PackageResolver`) and consumed opaquely by the orchestrator and
//! the container launcher.

use serde::{Deserialize, Serialize};

use super::ServerKind;

/// Setup instructions attached to a resolved package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInstructions {
    /// Ordered human-readable setup steps.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub setup: Vec<String>,

    /// Runnable command (package name for process packages, image for
    /// container packages).
    pub command: String,

    /// Arguments to pass to the command.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    /// Names of environment variables the package requires at launch.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<String>,
}

/// A resolved package descriptor: identity plus launch metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageResolution {
    /// Package name as the directory knows it.
    pub name: String,

    /// Whether the package runs as a wrapped process or a container image.
    pub kind: ServerKind,

    /// Whether the directory has verified this package.
    #[serde(default)]
    pub verified: bool,

    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Launch instructions.
    pub instructions: PackageInstructions,
}

impl PackageResolution {
    /// Create a resolution with the given identity and command.
    pub fn new(name: impl Into<String>, kind: ServerKind, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            verified: false,
            description: None,
            instructions: PackageInstructions {
                setup: Vec::new(),
                command: command.into(),
                args: Vec::new(),
                env: Vec::new(),
            },
        }
    }

    /// Set the argument list.
    #[must_use]
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.instructions.args = args;
        self
    }

    /// Declare required environment variable names.
    #[must_use]
    pub fn with_required_env(mut self, env: Vec<String>) -> Self {
        self.instructions.env = env;
        self
    }

    /// Mark the package as directory-verified.
    #[must_use]
    pub const fn with_verified(mut self, verified: bool) -> Self {
        self.verified = verified;
        self
    }

    /// Environment variable names required but missing from the given keys.
    #[must_use]
    pub fn missing_env<'a>(&'a self, provided: &[String]) -> Vec<&'a str> {
        self.instructions
            .env
            .iter()
            .filter(|required| !provided.contains(required))
            .map(String::as_str)
            .collect()
    }
}
