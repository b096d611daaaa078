// # HTTP Node Client
//
// NodeClient implementation for the AdGuard Home DNS rewrite control API.
//
// - ✅ One HTTP request per trait call
// - ✅ Full error propagation (the engine decides what a failure means)
// - ✅ HTTP timeout configured (30 seconds by default)
// - ✅ Every failure normalized to `RequestError` (status or transport)
// - ❌ NO retry logic
// - ❌ NO caching (the node is re-listed on every run)
//
// ## Security Requirements
//
// - The credential NEVER appears in logs or Debug output
//
// ## API Reference
//
// - List rewrites:   GET  `{base}/control/rewrite/list`
// - Add rewrite:     POST `{base}/control/rewrite/add`    `{"domain": ..., "answer": ...}`
// - Delete rewrite:  POST `{base}/control/rewrite/delete` `{"domain": ..., "answer": ...}`
//
// Every request carries `Authorization: Basic <credential>` and
// `Content-Type: application/json`.

use agh_core::config::ClientConfig;
use agh_core::traits::{NodeClient, NodeClientFactory};
use agh_core::{Credential, Error, Node, Record, Result};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use std::time::Duration;

/// Default HTTP timeout for API requests (30 seconds)
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Rewrite control API path, relative to the node's base URL
const REWRITE_PATH: &str = "control/rewrite";

/// Client for one node's rewrite control API
pub struct HttpNodeClient {
    /// Node name (for logging)
    name: String,

    /// Base URL without trailing slash
    base_url: String,

    /// ⚠️ NEVER log this value
    credential: Credential,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the credential
impl std::fmt::Debug for HttpNodeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpNodeClient")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("credential", &"<REDACTED>")
            .finish()
    }
}

impl HttpNodeClient {
    /// Create a client for `node`
    ///
    /// # Errors
    ///
    /// - `Error::Request(Transport)`: the base URL is not an absolute http(s) URL
    /// - `Error::Other`: the HTTP client could not be built
    pub fn new(node: &Node, timeout: Duration) -> Result<Self> {
        let base_url = node.base_url.trim_end_matches('/').to_string();

        let parsed = reqwest::Url::parse(&base_url).map_err(|e| {
            Error::transport(format!("Invalid base URL for node {}: {}", node.name, e))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::transport(format!(
                "Base URL for node {} must use http or https. Got: {}",
                node.name,
                parsed.scheme()
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Other(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            name: node.name.clone(),
            base_url,
            credential: node.credential.clone(),
            client,
        })
    }

    /// Full URL of one rewrite endpoint
    fn endpoint(&self, action: &str) -> String {
        format!("{}/{}/{}", self.base_url, REWRITE_PATH, action)
    }

    /// Start a request to one rewrite endpoint with auth and content type set
    fn request(&self, method: reqwest::Method, action: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.endpoint(action))
            .header(AUTHORIZATION, format!("Basic {}", self.credential.expose()))
            .header(CONTENT_TYPE, "application/json")
    }

    /// Send and map any failure to a `RequestError`
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::transport(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        match status.as_u16() {
            401 | 403 => tracing::warn!(
                "Node {}: authentication failed (invalid credential or insufficient permissions). Status: {}",
                self.name,
                status
            ),
            404 => tracing::warn!(
                "Node {}: rewrite endpoint not found. Check the management URL. Status: {}",
                self.name,
                status
            ),
            500..=599 => tracing::warn!("Node {}: server error. Status: {}", self.name, status),
            _ => tracing::warn!("Node {}: request rejected. Status: {}", self.name, status),
        }

        Err(Error::status(status.as_u16()))
    }

    /// POST a record to `add` or `delete`
    async fn post_record(&self, action: &str, record: &Record) -> Result<()> {
        let request = self.request(reqwest::Method::POST, action).json(record);
        self.send(request).await?;
        Ok(())
    }
}

#[async_trait]
impl NodeClient for HttpNodeClient {
    async fn list(&self) -> Result<Vec<Record>> {
        tracing::debug!("Listing rewrites on {}", self.name);

        let response = self
            .send(self.request(reqwest::Method::GET, "list"))
            .await?;

        // Some node versions answer `null` instead of `[]` when empty
        let records: Option<Vec<Record>> = response
            .json()
            .await
            .map_err(|e| Error::transport(format!("Failed to parse rewrite list: {}", e)))?;

        Ok(records.unwrap_or_default())
    }

    async fn add(&self, record: &Record) -> Result<()> {
        tracing::debug!("Adding {} on {}", record, self.name);
        self.post_record("add", record).await
    }

    async fn delete(&self, record: &Record) -> Result<()> {
        tracing::debug!("Deleting {} on {}", record, self.name);
        self.post_record("delete", record).await
    }

    fn node_name(&self) -> &str {
        &self.name
    }
}

/// Factory for creating HTTP node clients
#[derive(Debug, Clone)]
pub struct HttpNodeClientFactory {
    timeout: Duration,
}

impl HttpNodeClientFactory {
    /// Create a factory with an explicit request timeout
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Create a factory from client configuration
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(Duration::from_secs(config.timeout_secs))
    }
}

impl Default for HttpNodeClientFactory {
    fn default() -> Self {
        Self::new(DEFAULT_HTTP_TIMEOUT)
    }
}

impl NodeClientFactory for HttpNodeClientFactory {
    fn create(&self, node: &Node) -> Result<Box<dyn NodeClient>> {
        Ok(Box::new(HttpNodeClient::new(node, self.timeout)?))
    }
}
