//! Upstream fetcher with per-endpoint timeout and failover.
//!
//! Endpoints are tried strictly in order. Each attempt gets its own
//! timeout; a failed or slow endpoint is logged and the next one is tried.
//! There is no retry beyond the endpoint list, so a cold fetch takes at
//! most `endpoints.len() × timeout`.

use std::time::Duration;

use tracing::{debug, instrument, warn};

use super::http::AsyncHttpClient;
use super::overpass::{parse_response, QUERY_FIELD};
use super::types::{ProviderError, Upstream};
use crate::element::Element;
use crate::query::UpstreamQuery;

/// Default per-attempt timeout.
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(15);

/// Runs `query` against each endpoint in turn until one succeeds.
///
/// # Arguments
///
/// * `client` - HTTP client used for every attempt
/// * `query` - The upstream query
/// * `endpoints` - Ordered endpoint candidates
/// * `timeout` - Independent timeout for each attempt
///
/// # Errors
///
/// [`ProviderError::NoEndpoints`] for an empty list, otherwise
/// [`ProviderError::UpstreamUnavailable`] carrying the last failure.
pub async fn fetch_upstream<C: AsyncHttpClient>(
    client: &C,
    query: &UpstreamQuery,
    endpoints: &[String],
    timeout: Duration,
) -> Result<Vec<Element>, ProviderError> {
    let mut last_error = None;

    for endpoint in endpoints {
        let attempt = tokio::time::timeout(
            timeout,
            client.post_form(endpoint, &[(QUERY_FIELD, query.as_str())]),
        )
        .await;

        let result = match attempt {
            Ok(Ok(body)) => parse_response(&body),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ProviderError::Timeout {
                endpoint: endpoint.clone(),
                timeout_secs: timeout.as_secs(),
            }),
        };

        match result {
            Ok(elements) => {
                debug!(
                    endpoint = %endpoint,
                    elements = elements.len(),
                    "Upstream fetch succeeded"
                );
                return Ok(elements);
            }
            Err(e) => {
                warn!(endpoint = %endpoint, error = %e, "Upstream endpoint failed, trying next");
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(last) => Err(ProviderError::UpstreamUnavailable {
            attempts: endpoints.len(),
            last_error: Box::new(last),
        }),
        None => Err(ProviderError::NoEndpoints),
    }
}

/// Overpass-backed [`Upstream`] implementation.
///
/// # Example
///
/// ```ignore
/// use poilayer::provider::{AsyncReqwestClient, UpstreamFetcher};
///
/// let client = AsyncReqwestClient::new()?;
/// let fetcher = UpstreamFetcher::with_default_endpoints(client);
/// let elements = fetcher.fetch(&query).await?;
/// ```
pub struct UpstreamFetcher<C: AsyncHttpClient> {
    client: C,
    endpoints: Vec<String>,
    timeout: Duration,
}

impl<C: AsyncHttpClient> UpstreamFetcher<C> {
    /// Creates a fetcher for the given endpoints.
    pub fn new(client: C, endpoints: Vec<String>, timeout: Duration) -> Self {
        Self {
            client,
            endpoints,
            timeout,
        }
    }

    /// Creates a fetcher for the public Overpass endpoints.
    pub fn with_default_endpoints(client: C) -> Self {
        Self::new(
            client,
            super::overpass::DEFAULT_OVERPASS_ENDPOINTS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            DEFAULT_UPSTREAM_TIMEOUT,
        )
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl<C: AsyncHttpClient> Upstream for UpstreamFetcher<C> {
    #[instrument(skip_all, fields(endpoints = self.endpoints.len()))]
    async fn fetch(&self, query: &UpstreamQuery) -> Result<Vec<Element>, ProviderError> {
        fetch_upstream(&self.client, query, &self.endpoints, self.timeout).await
    }

    fn name(&self) -> &str {
        "Overpass"
    }
}
