//! Connection cache for remote endpoints.
//!
//! One live connection per distinct (endpoint, auth headers) pair, created
//! on demand and reused by every caller with the same key. Entries are
//! never silently evicted; they live until `clear`/`close` or process
//! shutdown.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use toolbridge_core::{ConnectError, ServerConnection};

use crate::http::{FallbackConnector, RemoteConnector};

type CacheKey = (String, String);

/// Cache of live remote connections.
pub struct ConnectionCache {
    connector: Arc<dyn RemoteConnector>,
    // Held across connection establishment so concurrent callers for the
    // same key share a single creation.
    connections: Mutex<HashMap<CacheKey, Arc<dyn ServerConnection>>>,
}

impl ConnectionCache {
    /// Cache backed by the production fallback connector.
    #[must_use]
    pub fn new() -> Self {
        Self::with_connector(Arc::new(FallbackConnector::new()))
    }

    /// Cache over an explicit connector (used by tests).
    #[must_use]
    pub fn with_connector(connector: Arc<dyn RemoteConnector>) -> Self {
        Self {
            connector,
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// Look up or create the connection for (endpoint, headers).
    pub async fn get_or_connect(
        &self,
        endpoint: &str,
        headers: &[(String, String)],
    ) -> Result<Arc<dyn ServerConnection>, ConnectError> {
        let key = (endpoint.to_string(), canonical_headers(headers));

        let mut connections = self.connections.lock().await;
        if let Some(existing) = connections.get(&key) {
            return Ok(Arc::clone(existing));
        }

        let connection = self.connector.connect(endpoint, headers).await?;
        connections.insert(key, Arc::clone(&connection));
        tracing::debug!(endpoint = %endpoint, total = connections.len(), "Cached new connection");
        Ok(connection)
    }

    /// Number of live cached connections.
    pub async fn len(&self) -> usize {
        self.connections.lock().await.len()
    }

    /// Whether the cache is empty.
    pub async fn is_empty(&self) -> bool {
        self.connections.lock().await.is_empty()
    }

    /// Close every cached connection without waiting and empty the cache.
    /// Forced-reset path; failures are logged by the connections.
    pub async fn clear(&self) {
        let drained: Vec<_> = self.connections.lock().await.drain().collect();
        for ((endpoint, _), connection) in drained {
            tokio::spawn(async move {
                connection.close().await;
                tracing::debug!(endpoint = %endpoint, "Closed cached connection");
            });
        }
    }

    /// Close every cached connection, awaiting all closures. Graceful
    /// shutdown path.
    pub async fn close(&self) {
        let drained: Vec<_> = self.connections.lock().await.drain().collect();
        for ((endpoint, _), connection) in drained {
            connection.close().await;
            tracing::debug!(endpoint = %endpoint, "Closed cached connection");
        }
    }
}

impl Default for ConnectionCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Canonical string form of a header set, insensitive to ordering.
fn canonical_headers(headers: &[(String, String)]) -> String {
    let mut pairs: Vec<String> = headers
        .iter()
        .map(|(k, v)| format!("{}={v}", k.to_ascii_lowercase()))
        .collect();
    pairs.sort();
    pairs.join(";")
}
