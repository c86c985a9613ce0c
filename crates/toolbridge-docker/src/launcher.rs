//! Launch-command construction.
//!
//! Pure translation from a resolved package to a `docker run` command
//! line. The hardening layer (no privilege escalation, pid limit, memory
//! and cpu ceilings) is always appended; callers only choose the resource
//! numbers.

use sha2::{Digest, Sha256};
use toolbridge_core::{EnvPair, InstallMode, LaunchSpec, ManagedServer, PackageResolution,
    ServerKind};

/// Image used as the interpreter wrapper for process-kind packages.
const NODE_IMAGE: &str = "node:22-alpine";

/// Command tokens `validate_command` accepts as a runtime.
const KNOWN_RUNTIMES: &[&str] = &["docker", "podman"];

/// Resource ceilings applied to every launched container.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceLimits {
    /// Maximum number of processes inside the container.
    pub pids: u32,
    /// Memory ceiling in megabytes.
    pub memory_mb: u32,
    /// CPU ceiling in fractional cores.
    pub cpus: f64,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            pids: 256,
            memory_mb: 512,
            cpus: 1.0,
        }
    }
}

/// Caller-selected aspects of a launch.
#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    /// Bridge mode attaches stdio; direct mode runs detached.
    pub mode: InstallMode,
    /// Environment variables passed into the container.
    pub env: Vec<EnvPair>,
    /// Host-to-container port mappings, included only when non-empty.
    pub ports: Vec<(u16, u16)>,
    /// Resource ceilings.
    pub limits: ResourceLimits,
}

impl LaunchOptions {
    /// Options for a bridge-mode launch with the given environment.
    #[must_use]
    pub fn bridge(env: Vec<EnvPair>) -> Self {
        Self {
            mode: InstallMode::Bridge,
            env,
            ports: Vec::new(),
            limits: ResourceLimits::default(),
        }
    }
}

/// Builds hardened container launch commands and derives container names.
///
/// All methods here are deterministic and side-effect free; runtime
/// queries live in [`crate::DockerRuntime`].
#[derive(Debug, Clone)]
pub struct DockerLauncher {
    binary: String,
}

impl DockerLauncher {
    /// Create a launcher using the `docker` binary.
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

    /// The runtime binary this launcher drives.
    #[must_use]
    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Translate a resolved package into a runnable launch spec.
    ///
    /// Process-kind packages run `npx -y <package>` inside the node
    /// wrapper image; container-kind packages run their image directly.
    #[must_use]
    pub fn build_launch_command(
        &self,
        resolution: &PackageResolution,
        options: &LaunchOptions,
    ) -> LaunchSpec {
        let mut args = vec!["run".to_string()];

        match options.mode {
            InstallMode::Bridge => {
                args.push("-i".to_string());
                args.push("--rm".to_string());
            }
            InstallMode::Direct => {
                args.push("-d".to_string());
            }
        }

        args.push("--name".to_string());
        args.push(derive_container_name(resolution));

        // Fixed hardening layer; only the numbers are caller-selected.
        args.push("--security-opt".to_string());
        args.push("no-new-privileges".to_string());
        args.push("--pids-limit".to_string());
        args.push(options.limits.pids.to_string());
        args.push("--memory".to_string());
        args.push(format!("{}m", options.limits.memory_mb));
        args.push("--cpus".to_string());
        args.push(format!("{}", options.limits.cpus));

        for pair in &options.env {
            args.push("-e".to_string());
            args.push(format!("{}={}", pair.key, pair.value));
        }

        for (host, container) in &options.ports {
            args.push("-p".to_string());
            args.push(format!("{host}:{container}"));
        }

        match resolution.kind {
            ServerKind::ProcessPackage => {
                args.push(NODE_IMAGE.to_string());
                args.push("npx".to_string());
                args.push("-y".to_string());
                args.push(resolution.instructions.command.clone());
            }
            ServerKind::ContainerPackage => {
                args.push(resolution.instructions.command.clone());
            }
        }

        args.extend(resolution.instructions.args.iter().cloned());

        let mut spec = LaunchSpec::new(self.binary.clone(), args);
        for pair in &options.env {
            spec = spec.with_env(pair.key.clone(), pair.value.clone());
        }
        spec
    }

    /// Structural sanity check on a launch spec. Fails closed: anything
    /// unrecognized is invalid rather than attempted.
    #[must_use]
    pub fn validate_command(&self, spec: &LaunchSpec) -> bool {
        if spec.command.is_empty() {
            return false;
        }
        // Accept a bare binary name or an absolute path to one.
        let basename = spec
            .command
            .rsplit('/')
            .next()
            .unwrap_or(spec.command.as_str());
        if !KNOWN_RUNTIMES.contains(&basename) {
            return false;
        }
        spec.args.first().is_some_and(|first| first == "run")
    }

    /// Stable, collision-resistant container identifier for a server.
    ///
    /// Prefers the `--name` token the builder embedded in the launch
    /// command; falls back to a hash of the full command line.
    #[must_use]
    pub fn container_name(&self, server: &ManagedServer) -> String {
        let args = &server.launch.args;
        if let Some(pos) = args.iter().position(|a| a == "--name") {
            if let Some(name) = args.get(pos + 1) {
                return name.clone();
            }
        }
        format!(
            "toolbridge-{}",
            &hash_tokens(&server.launch.command_line())[..12]
        )
    }
}

impl Default for DockerLauncher {
    fn default() -> Self {
        Self::new()
    }
}

/// Derive the `--name` value for a resolution: sanitized package name plus
/// a short hash of the launch identity.
fn derive_container_name(resolution: &PackageResolution) -> String {
    let mut identity = vec![
        resolution.instructions.command.clone(),
    ];
    identity.extend(resolution.instructions.args.iter().cloned());

    let sanitized: String = resolution
        .name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();

    format!("toolbridge-{sanitized}-{}", &hash_tokens(&identity)[..10])
}

fn hash_tokens(tokens: &[String]) -> String {
    let mut hasher = Sha256::new();
    for token in tokens {
        hasher.update(token.as_bytes());
        hasher.update([0u8]);
    }
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}
