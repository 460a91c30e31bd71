//! Provider types and traits

use std::fmt;
use std::future::Future;

use crate::element::Element;
use crate::query::UpstreamQuery;

/// Errors that can occur while talking to the upstream geodata service.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// HTTP request failed or returned a non-success status
    HttpError(String),
    /// A single endpoint attempt exceeded its timeout
    Timeout { endpoint: String, timeout_secs: u64 },
    /// The response body was not a well-formed feature list
    InvalidResponse(String),
    /// No endpoints were configured
    NoEndpoints,
    /// Every endpoint failed; carries the last failure
    UpstreamUnavailable {
        attempts: usize,
        last_error: Box<ProviderError>,
    },
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::HttpError(msg) => write!(f, "HTTP error: {}", msg),
            ProviderError::Timeout {
                endpoint,
                timeout_secs,
            } => write!(f, "Request to {} timed out after {}s", endpoint, timeout_secs),
            ProviderError::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),
            ProviderError::NoEndpoints => write!(f, "No upstream endpoints configured"),
            ProviderError::UpstreamUnavailable {
                attempts,
                last_error,
            } => write!(
                f,
                "Upstream unavailable after {} attempt(s): {}",
                attempts, last_error
            ),
        }
    }
}

impl std::error::Error for ProviderError {}

/// Source of raw upstream elements.
///
/// The revalidation coordinator depends on this trait rather than on
/// [`UpstreamFetcher`](super::UpstreamFetcher) directly, so tests can count
/// and script fetches.
pub trait Upstream: Send + Sync {
    /// Runs `query` against the upstream service.
    ///
    /// # Returns
    ///
    /// The parsed elements, or [`ProviderError::UpstreamUnavailable`] when
    /// no endpoint produced a usable response.
    fn fetch(
        &self,
        query: &UpstreamQuery,
    ) -> impl Future<Output = Result<Vec<Element>, ProviderError>> + Send;

    /// Returns the upstream's name for logging and identification.
    fn name(&self) -> &str;
}
