//! Pipeline result and error types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::ServiceCacheError;
use crate::element::Element;
use crate::records::RecordError;
use crate::region::RegionError;

/// Errors that fail a whole request.
///
/// Upstream outages never appear here; they are reported through
/// [`MergeMeta::upstream_error`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Malformed region query. Never retried.
    #[error("invalid region: {0}")]
    InvalidRegion(#[from] RegionError),

    /// Raw cache or snapshot store failure.
    #[error("cache store error: {0}")]
    Store(#[from] ServiceCacheError),

    /// An internal record accessor failed.
    #[error("record source error: {0}")]
    Records(#[from] RecordError),
}

/// Provenance counts and cache-state flags of a merged result.
///
/// Serialized with the camelCase field names clients consume.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeMeta {
    pub upstream: usize,
    pub curated: usize,
    pub operator: usize,
    pub community: usize,
    pub total: usize,
    /// Raw elements came from the raw cache rather than a fetch in this request
    pub cached: bool,
    /// Raw elements are past their fresh window
    pub stale: bool,
    /// A background revalidation was triggered by this request
    pub revalidating: bool,
    pub upstream_error: Option<String>,
    /// Served from a snapshot without re-running aggregation
    pub snapshot_cached: bool,
}

/// Deduplicated elements for one region query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeResult {
    pub elements: Vec<Element>,
    pub meta: MergeMeta,
}
