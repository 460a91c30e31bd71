//! HTTP client abstraction for testability

use std::future::Future;
use std::time::Duration;

use tracing::{debug, trace, warn};

use super::types::ProviderError;

/// User agent sent with upstream requests.
pub const DEFAULT_USER_AGENT: &str = concat!("poilayer/", env!("CARGO_PKG_VERSION"));

/// Trait for asynchronous HTTP client operations.
///
/// This abstraction allows for dependency injection and easier testing
/// by enabling mock HTTP clients in tests.
pub trait AsyncHttpClient: Send + Sync {
    /// Performs an async HTTP POST with a form-urlencoded body.
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to request
    /// * `fields` - Form fields as (name, value) pairs
    ///
    /// # Returns
    ///
    /// The response body as bytes or an error. Non-success status codes
    /// are errors.
    fn post_form(
        &self,
        url: &str,
        fields: &[(&str, &str)],
    ) -> impl Future<Output = Result<Vec<u8>, ProviderError>> + Send;
}

/// Async HTTP client implementation using reqwest.
pub struct AsyncReqwestClient {
    client: reqwest::Client,
}

impl AsyncReqwestClient {
    /// Creates a new AsyncReqwestClient with default configuration.
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_timeout(Duration::from_secs(30), DEFAULT_USER_AGENT)
    }

    /// Creates a new AsyncReqwestClient with a custom timeout and user agent.
    ///
    /// The fetcher applies its own per-attempt timeout on top; this one
    /// bounds connection setup and body reads inside reqwest.
    pub fn with_timeout(timeout: Duration, user_agent: &str) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                ProviderError::HttpError(format!("Failed to create async HTTP client: {}", e))
            })?;

        Ok(Self { client })
    }
}

impl AsyncHttpClient for AsyncReqwestClient {
    async fn post_form(&self, url: &str, fields: &[(&str, &str)]) -> Result<Vec<u8>, ProviderError> {
        trace!(url = url, "HTTP POST request starting");

        let response = match self.client.post(url).form(fields).send().await {
            Ok(resp) => {
                debug!(
                    url = url,
                    status = resp.status().as_u16(),
                    "HTTP response received"
                );
                resp
            }
            Err(e) => {
                warn!(
                    url = url,
                    error = %e,
                    is_connect = e.is_connect(),
                    is_timeout = e.is_timeout(),
                    "HTTP request failed"
                );
                return Err(ProviderError::HttpError(format!("Request failed: {}", e)));
            }
        };

        // Check HTTP status
        if !response.status().is_success() {
            warn!(
                url = url,
                status = response.status().as_u16(),
                "HTTP error status"
            );
            return Err(ProviderError::HttpError(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        // Read response body
        match response.bytes().await {
            Ok(bytes) => {
                trace!(url = url, bytes = bytes.len(), "HTTP response body read");
                Ok(bytes.to_vec())
            }
            Err(e) => {
                warn!(url = url, error = %e, "Failed to read response body");
                Err(ProviderError::HttpError(format!(
                    "Failed to read response: {}",
                    e
                )))
            }
        }
    }
}
