//! Domain model for the bridge.

mod package;
mod server;
mod tool;

pub use package::{PackageInstructions, PackageResolution};
pub use server::{EnvPair, InstallMode, LaunchSpec, ManagedServer, ServerKind, ServerStatus};
pub use tool::{ToolCallResult, ToolContent, ToolDef};
