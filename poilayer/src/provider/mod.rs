//! Upstream geodata provider.
//!
//! This module talks to the external geodata service (an Overpass API
//! interpreter): an HTTP client abstraction, response parsing, and a
//! fetcher that walks an ordered endpoint list with per-attempt timeouts.
//!
//! ```ignore
//! use poilayer::provider::{AsyncReqwestClient, Upstream, UpstreamFetcher};
//!
//! let client = AsyncReqwestClient::new()?;
//! let fetcher = UpstreamFetcher::with_default_endpoints(client);
//! let elements = fetcher.fetch(&query).await?;
//! ```

mod fetcher;
mod http;
mod overpass;
mod types;

pub use fetcher::{fetch_upstream, UpstreamFetcher, DEFAULT_UPSTREAM_TIMEOUT};
pub use http::{AsyncHttpClient, AsyncReqwestClient, DEFAULT_USER_AGENT};
pub use overpass::{parse_response, DEFAULT_OVERPASS_ENDPOINTS};
pub use types::{ProviderError, Upstream};

