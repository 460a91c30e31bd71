//! Runtime pipeline configuration.

use std::time::Duration;

use crate::cache::{TtlPolicy, DEFAULT_SNAPSHOT_TTL};
use crate::query::DEFAULT_TERRITORY;
use crate::region::{Region, DEFAULT_KEY_PRECISION, MAX_KEY_PRECISION};

/// Default byte budget of each in-memory store (256 MB).
pub const DEFAULT_CACHE_SIZE_BYTES: u64 = 256 * 1024 * 1024;

/// Configuration for [`Pipeline`](super::Pipeline).
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Decimal places used when deriving cache keys (0..=6).
    pub key_precision: u8,
    /// Windows for bounding-box queries.
    pub bbox_policy: TtlPolicy,
    /// Windows for whole-territory queries.
    pub territory_policy: TtlPolicy,
    /// Lifetime of a merged snapshot.
    pub snapshot_ttl: Duration,
    /// Byte budget of the raw store and of the snapshot store, each.
    pub cache_size_bytes: u64,
    /// ISO 3166-1 code of the default territory.
    pub territory: String,
    /// Log one line per request.
    pub log_requests: bool,
    /// Include cache state and per-source counts in the request line.
    pub log_detail: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            key_precision: DEFAULT_KEY_PRECISION,
            bbox_policy: TtlPolicy::bbox(),
            territory_policy: TtlPolicy::territory(),
            snapshot_ttl: DEFAULT_SNAPSHOT_TTL,
            cache_size_bytes: DEFAULT_CACHE_SIZE_BYTES,
            territory: DEFAULT_TERRITORY.to_string(),
            log_requests: true,
            log_detail: true,
        }
    }
}

impl PipelineConfig {
    /// Returns the TTL policy for a query over `region`.
    pub fn policy_for(&self, region: &Region) -> TtlPolicy {
        match region {
            Region::Bounded(_) => self.bbox_policy,
            Region::Territory => self.territory_policy,
        }
    }

    /// Sets the key precision, clamped to the supported range.
    pub fn with_key_precision(mut self, precision: u8) -> Self {
        self.key_precision = precision.min(MAX_KEY_PRECISION);
        self
    }
}
