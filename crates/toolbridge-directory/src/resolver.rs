//! Directory-backed package resolver.

use std::sync::Arc;

use async_trait::async_trait;

use toolbridge_core::{DirectoryError, PackageResolution, PackageResolver, ResolveError};

use crate::client::DirectoryClient;

/// Resolves package queries through the directory's resolve endpoint.
pub struct DirectoryResolver {
    client: Arc<DirectoryClient>,
}

impl DirectoryResolver {
    /// Create a resolver over an existing directory client.
    #[must_use]
    pub const fn new(client: Arc<DirectoryClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PackageResolver for DirectoryResolver {
    async fn resolve(&self, query: &str) -> Result<PackageResolution, ResolveError> {
        let value = match self.client.resolve_package(query).await {
            Ok(value) => value,
            Err(DirectoryError::RequestFailed { status: 404, .. }) => {
                return Err(ResolveError::NotFound(query.to_string()));
            }
            Err(e) => return Err(ResolveError::Directory(e)),
        };

        let resolution: PackageResolution = serde_json::from_value(value)
            .map_err(|e| ResolveError::Invalid(e.to_string()))?;

        if resolution.instructions.command.is_empty() {
            return Err(ResolveError::Invalid(format!(
                "Package '{}' has no runnable command",
                resolution.name
            )));
        }

        tracing::debug!(
            query = %query,
            package = %resolution.name,
            verified = resolution.verified,
            "Resolved package"
        );
        Ok(resolution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::FakeBackend;
    use serde_json::json;

    fn resolver_with(backend: FakeBackend) -> DirectoryResolver {
        let client =
            DirectoryClient::with_backend(Arc::new(backend), "https://directory.example").unwrap();
        DirectoryResolver::new(Arc::new(client))
    }

    #[tokio::test]
    async fn test_resolves_package() {
        let backend = FakeBackend::new().with_response(
            "packages/resolve",
            json!({
                "name": "weather-tools",
                "kind": "process-package",
                "verified": true,
                "instructions": {
                    "command": "@example/weather-tools",
                    "args": ["--stdio"],
                    "env": ["API_KEY"]
                }
            }),
        );

        let resolution = resolver_with(backend).resolve("weather").await.unwrap();
        assert_eq!(resolution.name, "weather-tools");
        assert!(resolution.verified);
        assert_eq!(resolution.instructions.env, vec!["API_KEY"]);
    }

    #[tokio::test]
    async fn test_missing_package_is_not_found() {
        let err = resolver_with(FakeBackend::new())
            .resolve("ghost")
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::NotFound(q) if q == "ghost"));
    }

    #[tokio::test]
    async fn test_commandless_package_is_invalid() {
        let backend = FakeBackend::new().with_response(
            "packages/resolve",
            json!({
                "name": "broken",
                "kind": "process-package",
                "instructions": {"command": ""}
            }),
        );

        let err = resolver_with(backend).resolve("broken").await.unwrap_err();
        assert!(matches!(err, ResolveError::Invalid(_)));
    }
}
