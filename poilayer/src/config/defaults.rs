//! Default values and constants for all configuration settings.

use std::path::PathBuf;

use super::settings::*;
use crate::provider::{DEFAULT_OVERPASS_ENDPOINTS, DEFAULT_USER_AGENT};
use crate::query::DEFAULT_TERRITORY;
use crate::region::DEFAULT_KEY_PRECISION;

/// Default per-endpoint timeout (seconds).
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 15;

/// Default fresh TTL for bounding-box queries (5 minutes).
pub const DEFAULT_BBOX_TTL_SECS: u64 = 5 * 60;

/// Default stale window for bounding-box queries (24 hours).
pub const DEFAULT_BBOX_STALE_TTL_SECS: u64 = 24 * 60 * 60;

/// Default fresh TTL for whole-territory queries (30 minutes).
pub const DEFAULT_TERRITORY_TTL_SECS: u64 = 30 * 60;

/// Default stale window for whole-territory queries (7 days).
pub const DEFAULT_TERRITORY_STALE_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Default snapshot lifetime (seconds).
pub const DEFAULT_SNAPSHOT_TTL_SECS: u64 = 60;

/// Default memory budget per store (MB).
pub const DEFAULT_MAX_SIZE_MB: u64 = 256;

/// Default log directory, relative to the working directory.
pub const DEFAULT_LOG_DIRECTORY: &str = "logs";

/// Log file name inside the log directory.
pub const DEFAULT_LOG_FILE: &str = "poilayer.log";

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            upstream: UpstreamSettings {
                endpoints: DEFAULT_OVERPASS_ENDPOINTS
                    .iter()
                    .map(|e| e.to_string())
                    .collect(),
                timeout_secs: DEFAULT_UPSTREAM_TIMEOUT_SECS,
                territory: DEFAULT_TERRITORY.to_string(),
                user_agent: DEFAULT_USER_AGENT.to_string(),
            },
            cache: CacheSettings {
                key_precision: DEFAULT_KEY_PRECISION,
                bbox_ttl_secs: DEFAULT_BBOX_TTL_SECS,
                bbox_stale_ttl_secs: DEFAULT_BBOX_STALE_TTL_SECS,
                territory_ttl_secs: DEFAULT_TERRITORY_TTL_SECS,
                territory_stale_ttl_secs: DEFAULT_TERRITORY_STALE_TTL_SECS,
                snapshot_ttl_secs: DEFAULT_SNAPSHOT_TTL_SECS,
                max_size_mb: DEFAULT_MAX_SIZE_MB,
            },
            records: RecordsSettings::default(),
            logging: LoggingSettings {
                enabled: true,
                detail: true,
                directory: PathBuf::from(DEFAULT_LOG_DIRECTORY),
            },
        }
    }
}
