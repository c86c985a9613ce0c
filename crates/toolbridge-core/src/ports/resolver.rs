//! Package resolver port.

use async_trait::async_trait;
use thiserror::Error;

use super::DirectoryError;
use crate::domain::PackageResolution;

/// Errors from package resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("No package found for '{0}'")]
    NotFound(String),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error("Invalid package descriptor: {0}")]
    Invalid(String),
}

/// Resolves a free-form query or explicit package name into a launchable
/// package descriptor.
#[async_trait]
pub trait PackageResolver: Send + Sync {
    /// Resolve `query` to a package the bridge can install.
    async fn resolve(&self, query: &str) -> Result<PackageResolution, ResolveError>;
}
