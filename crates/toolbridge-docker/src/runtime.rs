//! Container runtime queries over the docker CLI.
//!
//! Control commands raise `RuntimeError` only when the command itself
//! fails; missing containers are ordinary answers, not errors.

use async_trait::async_trait;
use tokio::process::Command;
use toolbridge_core::{ContainerRuntime, ContainerStatus, RuntimeError};

/// `ContainerRuntime` implementation shelling out to the docker CLI.
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    binary: String,
}

impl DockerRuntime {
    /// Create a runtime handle using the `docker` binary.
    #[must_use]
    pub fn new() -> Self {
        Self {
            binary: "docker".to_string(),
        }
    }

    /// Use a different runtime binary (e.g. "podman").
    #[must_use]
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    async fn run(&self, args: &[&str]) -> Result<std::process::Output, RuntimeError> {
        Command::new(&self.binary)
            .args(args)
            .output()
            .await
            .map_err(RuntimeError::Io)
    }
}

impl Default for DockerRuntime {
    fn default() -> Self {
        Self::new()
    }
}

/// Interpret `docker inspect --format {{.State.Running}}` output.
fn parse_inspect_output(success: bool, stdout: &str) -> ContainerStatus {
    if !success {
        return ContainerStatus::NotFound;
    }
    match stdout.trim() {
        "true" => ContainerStatus::Running,
        _ => ContainerStatus::Stopped,
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn is_available(&self) -> bool {
        match self.run(&["version", "--format", "{{.Server.Version}}"]).await {
            Ok(output) => output.status.success(),
            Err(e) => {
                tracing::debug!(error = %e, "Container runtime probe failed");
                false
            }
        }
    }

    async fn container_status(&self, name: &str) -> ContainerStatus {
        match self
            .run(&["inspect", "--format", "{{.State.Running}}", name])
            .await
        {
            Ok(output) => parse_inspect_output(
                output.status.success(),
                &String::from_utf8_lossy(&output.stdout),
            ),
            Err(e) => {
                tracing::debug!(container = %name, error = %e, "Container status query failed");
                ContainerStatus::NotFound
            }
        }
    }

    async fn stop_container(&self, name: &str) -> Result<bool, RuntimeError> {
        if self.container_status(name).await != ContainerStatus::Running {
            return Ok(false);
        }

        let output = self.run(&["stop", name]).await?;
        if output.status.success() {
            tracing::info!(container = %name, "Stopped container");
            Ok(true)
        } else {
            Err(RuntimeError::CommandFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ))
        }
    }

    async fn remove_container(&self, name: &str) -> Result<bool, RuntimeError> {
        if self.container_status(name).await == ContainerStatus::NotFound {
            return Ok(false);
        }

        let output = self.run(&["rm", "-f", name]).await?;
        if output.status.success() {
            tracing::info!(container = %name, "Removed container");
            Ok(true)
        } else {
            Err(RuntimeError::CommandFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ))
        }
    }

    async fn container_logs(&self, name: &str, lines: u32) -> Option<String> {
        let tail = lines.to_string();
        match self.run(&["logs", "--tail", &tail, name]).await {
            Ok(output) if output.status.success() => {
                // docker writes container stderr to our stderr; keep both.
                let mut text = String::from_utf8_lossy(&output.stdout).to_string();
                let err = String::from_utf8_lossy(&output.stderr);
                if !err.trim().is_empty() {
                    text.push_str(&err);
                }
                Some(text)
            }
            Ok(output) => {
                tracing::debug!(
                    container = %name,
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "Log fetch failed"
                );
                None
            }
            Err(e) => {
                tracing::debug!(container = %name, error = %e, "Log fetch failed");
                None
            }
        }
    }
}
