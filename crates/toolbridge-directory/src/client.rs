//! Directory API client.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use toolbridge_core::{
    DirectoryApi, DirectoryError, RegistrationReceipt, ServerDescriptor, ServerSummary,
};

use crate::http::{HttpBackend, ReqwestBackend};

/// Default public directory endpoint.
pub const DEFAULT_DIRECTORY_URL: &str = "https://directory.toolbridge.dev";

/// Directory client configuration.
#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    /// Base URL of the directory service.
    pub base_url: String,
    /// Optional bearer token for authenticated calls.
    pub token: Option<String>,
    /// Retries for transient failures.
    pub max_retries: u8,
    /// Base delay for exponential backoff.
    pub retry_base_delay_ms: u64,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_DIRECTORY_URL.to_string(),
            token: None,
            max_retries: 3,
            retry_base_delay_ms: 500,
        }
    }
}

impl DirectoryConfig {
    /// Point the client at a different directory.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Authenticate calls with a bearer token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

/// Client for the central discovery directory.
///
/// The bridge is a plain consumer of the directory: errors are surfaced to
/// the caller as-is, beyond the transport's bounded retry.
pub struct DirectoryClient {
    backend: Arc<dyn HttpBackend>,
    base_url: Url,
}

impl DirectoryClient {
    /// Create a client with the production HTTP backend.
    pub fn new(config: &DirectoryConfig) -> Result<Self, DirectoryError> {
        let backend = Arc::new(ReqwestBackend::new(config));
        Self::with_backend(backend, &config.base_url)
    }

    /// Create a client over an explicit backend (used by tests).
    pub fn with_backend(
        backend: Arc<dyn HttpBackend>,
        base_url: &str,
    ) -> Result<Self, DirectoryError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| DirectoryError::InvalidResponse(format!("Invalid base URL: {e}")))?;
        Ok(Self { backend, base_url })
    }

    fn api_url(&self, path: &str) -> Result<Url, DirectoryError> {
        self.base_url
            .join(path)
            .map_err(|e| DirectoryError::InvalidResponse(format!("Invalid API path: {e}")))
    }

    /// Fetch and parse the resolve endpoint for a package query.
    ///
    /// Exposed for the directory-backed package resolver; plain directory
    /// consumers use the `DirectoryApi` trait surface.
    pub async fn resolve_package(&self, query: &str) -> Result<Value, DirectoryError> {
        let mut url = self.api_url("api/packages/resolve")?;
        url.query_pairs_mut().append_pair("q", query);
        self.backend.get_json(&url).await
    }
}

#[async_trait]
impl DirectoryApi for DirectoryClient {
    async fn search(&self, query: &str) -> Result<Vec<ServerSummary>, DirectoryError> {
        let mut url = self.api_url("api/servers/search")?;
        url.query_pairs_mut().append_pair("q", query);

        let value = self.backend.get_json(&url).await?;
        let servers = value
            .get("servers")
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new()));

        let summaries: Vec<ServerSummary> = serde_json::from_value(servers)
            .map_err(|e| DirectoryError::InvalidResponse(e.to_string()))?;

        tracing::debug!(query = %query, results = summaries.len(), "Directory search");
        Ok(summaries)
    }

    async fn register(
        &self,
        descriptor: &ServerDescriptor,
    ) -> Result<RegistrationReceipt, DirectoryError> {
        let url = self.api_url("api/servers")?;
        let body = serde_json::to_value(descriptor)
            .map_err(|e| DirectoryError::InvalidResponse(e.to_string()))?;

        let value = self.backend.post_json(&url, &body).await?;
        let receipt: RegistrationReceipt = serde_json::from_value(value)
            .map_err(|e| DirectoryError::InvalidResponse(e.to_string()))?;

        tracing::info!(
            server_name = %receipt.name,
            accepted = receipt.accepted,
            "Directory registration"
        );
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::FakeBackend;
    use serde_json::json;

    fn client_with(backend: FakeBackend) -> DirectoryClient {
        DirectoryClient::with_backend(Arc::new(backend), "https://directory.example").unwrap()
    }

    #[tokio::test]
    async fn test_search_parses_summaries() {
        let backend = FakeBackend::new().with_response(
            "servers/search",
            json!({
                "servers": [
                    {"name": "weather", "description": "Weather tools", "package": "@example/weather-tools", "verified": true},
                    {"name": "files", "endpoint": "https://files.example/mcp"}
                ]
            }),
        );

        let results = client_with(backend).search("weather").await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].name, "weather");
        assert!(results[0].verified);
        assert_eq!(results[1].endpoint.as_deref(), Some("https://files.example/mcp"));
    }

    #[tokio::test]
    async fn test_search_encodes_query() {
        let backend = FakeBackend::new().with_response("q=weather+%26+alerts", json!({"servers": []}));
        let results = client_with(backend).search("weather & alerts").await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_search_tolerates_missing_servers_field() {
        let backend = FakeBackend::new().with_response("servers/search", json!({}));
        let results = client_with(backend).search("anything").await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_register_posts_descriptor() {
        let backend = FakeBackend::new().with_response(
            "api/servers",
            json!({"name": "weather", "accepted": true, "message": "pending verification"}),
        );
        let backend = std::sync::Arc::new(backend);
        let client =
            DirectoryClient::with_backend(Arc::clone(&backend) as Arc<dyn HttpBackend>, "https://directory.example")
                .unwrap();

        let descriptor = ServerDescriptor {
            name: "weather".to_string(),
            endpoint: "https://weather.example/mcp".to_string(),
            description: Some("Weather tools".to_string()),
            capabilities: vec!["forecast".to_string()],
        };

        let receipt = client.register(&descriptor).await.unwrap();
        assert!(receipt.accepted);
        assert_eq!(receipt.message.as_deref(), Some("pending verification"));

        let posts = backend.posted();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].1["name"], "weather");
    }

    #[tokio::test]
    async fn test_search_failure_surfaces_status() {
        let backend = FakeBackend::new(); // nothing canned -> 404
        let err = client_with(backend).search("ghost").await.unwrap_err();
        assert!(matches!(
            err,
            DirectoryError::RequestFailed { status: 404, .. }
        ));
    }
}
