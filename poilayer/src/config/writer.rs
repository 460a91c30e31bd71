//! INI serialization logic for converting `ConfigFile` → INI string.
//!
//! Produces the commented representation written to `config.ini`.

use std::path::Path;

use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let records = &config.records;

    format!(
        r#"[upstream]
; Overpass interpreter endpoints, comma separated, tried in order
endpoints = {}
; Timeout for each endpoint attempt, in seconds (default: 15)
timeout_secs = {}
; ISO 3166-1 code used when no bounding box is given (default: KR)
territory = {}
; User agent sent with upstream requests
user_agent = {}

[cache]
; Decimal places of cache keys, 0 to 6 (default: 2). Viewports that round
; to the same digits share one cache entry.
key_precision = {}
; Bounding-box queries: fresh TTL and stale window, in seconds
bbox_ttl_secs = {}
bbox_stale_ttl_secs = {}
; Whole-territory queries: fresh TTL and stale window, in seconds
territory_ttl_secs = {}
territory_stale_ttl_secs = {}
; Lifetime of merged snapshots, in seconds (default: 60)
snapshot_ttl_secs = {}
; Memory budget of each cache store, in megabytes (default: 256)
max_size_mb = {}

[records]
; JSON arrays of internal rows. Leave empty to serve upstream data only.
curated_file = {}
operator_file = {}
community_file = {}

[logging]
; Log one line per request
enabled = {}
; Add cache state and per-source counts to request lines
detail = {}
; Directory for poilayer.log
directory = {}
"#,
        config.upstream.endpoints.join(", "),
        config.upstream.timeout_secs,
        config.upstream.territory,
        config.upstream.user_agent,
        config.cache.key_precision,
        config.cache.bbox_ttl_secs,
        config.cache.bbox_stale_ttl_secs,
        config.cache.territory_ttl_secs,
        config.cache.territory_stale_ttl_secs,
        config.cache.snapshot_ttl_secs,
        config.cache.max_size_mb,
        optional_path(records.curated_file.as_deref()),
        optional_path(records.operator_file.as_deref()),
        optional_path(records.community_file.as_deref()),
        config.logging.enabled,
        config.logging.detail,
        path_to_string(&config.logging.directory),
    )
}

fn optional_path(path: Option<&Path>) -> String {
    path.map(path_to_string).unwrap_or_default()
}

fn path_to_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
