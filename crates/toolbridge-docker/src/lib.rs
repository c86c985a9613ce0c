//! Container launch-command construction and runtime control.
//!
//! This crate is the bridge's only point of contact with the container
//! runtime. `launcher` turns resolved packages into hardened `docker run`
//! command lines; `runtime` implements the `ContainerRuntime` port over
//! the docker CLI.

mod launcher;
mod runtime;

pub use launcher::{DockerLauncher, LaunchOptions, ResourceLimits};
pub use runtime::DockerRuntime;
