//! Host services injected into plugins.
//!
//! A plugin only reaches the outside world through these traits; the
//! capability surface adapts them for script code.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lantern_types::{Key, ObjectList};

use crate::error::{HttpError, StoreError};

/// Timeout applied to every plugin HTTP request unless configured otherwise.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Cluster object store reached through `dashboardClient`.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Fetch a single object. A missing object is `Ok(None)`.
    async fn get(&self, key: &Key) -> Result<Option<serde_json::Value>, StoreError>;

    /// List objects matching the key's type, namespace and selector.
    async fn list(&self, key: &Key) -> Result<ObjectList, StoreError>;

    async fn delete(&self, key: &Key) -> Result<(), StoreError>;

    /// Apply every object in a (possibly multi-document) YAML string.
    ///
    /// Objects without a namespace land in `namespace`. Returns one line per
    /// object applied.
    async fn create_or_update_from_yaml(&self, namespace: &str, yaml: &str)
        -> Result<Vec<String>, StoreError>;
}

/// Outbound HTTP used by `httpClient`.
///
/// Called from the plugin's engine loop, which has no async runtime of its
/// own; implementations block until the response body has been read.
pub trait HttpTransport: Send + Sync + 'static {
    /// GET `url` and return the raw response body.
    fn get(&self, url: &str) -> Result<Vec<u8>, HttpError>;
}

/// [`HttpTransport`] backed by reqwest's blocking client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new(DEFAULT_HTTP_TIMEOUT)
    }
}

impl HttpTransport for ReqwestTransport {
    fn get(&self, url: &str) -> Result<Vec<u8>, HttpError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| HttpError::Request(e.to_string()))?;

        tracing::debug!(url, "plugin http get");
        let response = client
            .get(url)
            .send()
            .map_err(|e| HttpError::Request(e.to_string()))?;
        let body = response.bytes().map_err(|e| HttpError::Body(e.to_string()))?;
        Ok(body.to_vec())
    }
}

/// Everything the capability surface needs from the host.
#[derive(Clone)]
pub struct PluginServices {
    pub store: Arc<dyn ObjectStore>,
    pub http: Arc<dyn HttpTransport>,
}

impl PluginServices {
    /// Services backed by `store` and a default [`ReqwestTransport`].
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            http: Arc::new(ReqwestTransport::default()),
        }
    }

    pub fn with_http(mut self, http: Arc<dyn HttpTransport>) -> Self {
        self.http = http;
        self
    }
}
