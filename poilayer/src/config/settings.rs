//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types with no parsing or serialization logic.

use std::path::PathBuf;

/// Complete configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    /// Upstream geodata service settings
    pub upstream: UpstreamSettings,
    /// Raw cache and snapshot settings
    pub cache: CacheSettings,
    /// Internal record set locations
    pub records: RecordsSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

/// Upstream service configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamSettings {
    /// Interpreter endpoints, tried in order
    pub endpoints: Vec<String>,
    /// Per-endpoint timeout in seconds
    pub timeout_secs: u64,
    /// ISO 3166-1 code of the whole-territory query
    pub territory: String,
    /// User agent sent to the upstream
    pub user_agent: String,
}

/// Cache configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSettings {
    /// Decimal places of cache keys (0..=6)
    pub key_precision: u8,
    /// Fresh TTL for bounding-box queries, seconds
    pub bbox_ttl_secs: u64,
    /// Stale window for bounding-box queries, seconds
    pub bbox_stale_ttl_secs: u64,
    /// Fresh TTL for whole-territory queries, seconds
    pub territory_ttl_secs: u64,
    /// Stale window for whole-territory queries, seconds
    pub territory_stale_ttl_secs: u64,
    /// Snapshot lifetime, seconds
    pub snapshot_ttl_secs: u64,
    /// Memory budget of each store, megabytes
    pub max_size_mb: u64,
}

/// Locations of the JSON record files.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordsSettings {
    pub curated_file: Option<PathBuf>,
    pub operator_file: Option<PathBuf>,
    pub community_file: Option<PathBuf>,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    /// Log one line per pipeline request
    pub enabled: bool,
    /// Include cache state and per-source counts in request lines
    pub detail: bool,
    /// Directory for the log file
    pub directory: PathBuf,
}
