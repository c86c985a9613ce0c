//! HTTP backend abstraction for the directory API.
//!
//! Trait-based backend so the client can be exercised against canned
//! responses. The production implementation uses reqwest with bounded
//! retry for transient errors.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use url::Url;

use toolbridge_core::DirectoryError;

use crate::client::DirectoryConfig;

/// Trait for HTTP backends that exchange JSON with the directory.
#[async_trait]
pub trait HttpBackend: Send + Sync {
    /// Fetch JSON from a URL.
    async fn get_json(&self, url: &Url) -> Result<Value, DirectoryError>;

    /// Post a JSON body and return the JSON response.
    async fn post_json(&self, url: &Url, body: &Value) -> Result<Value, DirectoryError>;
}

/// Production backend: reqwest with exponential backoff for server-side
/// (5xx) and network errors.
pub struct ReqwestBackend {
    client: reqwest::Client,
    max_retries: u8,
    retry_base_delay_ms: u64,
    auth_token: Option<String>,
}

impl ReqwestBackend {
    /// Create a backend from the directory configuration.
    #[must_use]
    pub fn new(config: &DirectoryConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            client,
            max_retries: config.max_retries,
            retry_base_delay_ms: config.retry_base_delay_ms,
            auth_token: config.token.clone(),
        }
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => builder.header("Authorization", format!("Bearer {token}")),
            None => builder,
        }
    }

    async fn send_with_retry(
        &self,
        build: impl Fn() -> reqwest::RequestBuilder + Send,
        url: &Url,
    ) -> Result<reqwest::Response, DirectoryError> {
        let mut last_error: Option<DirectoryError> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_millis(
                    self.retry_base_delay_ms * 2u64.pow(u32::from(attempt) - 1),
                );
                tokio::time::sleep(delay).await;
            }

            match self.authorize(build()).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }

                    // 5xx is retryable; 4xx fails immediately.
                    if status.is_server_error() && attempt < self.max_retries {
                        last_error = Some(DirectoryError::RequestFailed {
                            status: status.as_u16(),
                            url: url.to_string(),
                        });
                        continue;
                    }

                    return Err(DirectoryError::RequestFailed {
                        status: status.as_u16(),
                        url: url.to_string(),
                    });
                }
                Err(e) => {
                    if attempt < self.max_retries {
                        last_error = Some(DirectoryError::Network(e.to_string()));
                        continue;
                    }
                    return Err(DirectoryError::Network(e.to_string()));
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| DirectoryError::Network("Unknown error during fetch".to_string())))
    }
}

#[async_trait]
impl HttpBackend for ReqwestBackend {
    async fn get_json(&self, url: &Url) -> Result<Value, DirectoryError> {
        let response = self
            .send_with_retry(|| self.client.get(url.as_str()), url)
            .await?;
        response
            .json()
            .await
            .map_err(|e| DirectoryError::InvalidResponse(e.to_string()))
    }

    async fn post_json(&self, url: &Url, body: &Value) -> Result<Value, DirectoryError> {
        let response = self
            .send_with_retry(|| self.client.post(url.as_str()).json(body), url)
            .await?;
        response
            .json()
            .await
            .map_err(|e| DirectoryError::InvalidResponse(e.to_string()))
    }
}

// ============================================================================
// Fake backend for testing
// ============================================================================


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_backend_configuration() {
        let config = DirectoryConfig::default();
        let backend = ReqwestBackend::new(&config);
        assert_eq!(backend.max_retries, 3);
        assert_eq!(backend.retry_base_delay_ms, 500);
        assert!(backend.auth_token.is_none());
    }

    #[test]
    fn test_backend_with_token() {
        let config = DirectoryConfig::default().with_token("secret");
        let backend = ReqwestBackend::new(&config);
        assert_eq!(backend.auth_token.as_deref(), Some("secret"));
    }

    #[tokio::test]
    async fn test_fake_backend_returns_canned_response() {
        let backend = testing::FakeBackend::new()
            .with_response("search", json!({"servers": []}));

        let url = Url::parse("https://directory.example/api/servers/search?q=x").unwrap();
        let value = backend.get_json(&url).await.unwrap();
        assert_eq!(value, json!({"servers": []}));
    }

    #[tokio::test]
    async fn test_fake_backend_404_for_unknown_url() {
        let backend = testing::FakeBackend::new();
        let url = Url::parse("https://directory.example/unknown").unwrap();
        let err = backend.get_json(&url).await.unwrap_err();
        assert!(matches!(
            err,
            DirectoryError::RequestFailed { status: 404, .. }
        ));
    }
}
