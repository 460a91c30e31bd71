//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This module contains the `parse_ini()` function and its helpers.
//! It is the single place where INI key names are mapped to struct fields.
//! Unknown sections and keys are ignored.

use std::path::PathBuf;

use ini::Ini;

use super::file::ConfigFileError;
use super::settings::ConfigFile;
use crate::region::MAX_KEY_PRECISION;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [upstream] section
    if let Some(section) = ini.section(Some("upstream")) {
        if let Some(v) = section.get("endpoints") {
            let endpoints: Vec<String> = v
                .split(',')
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(str::to_string)
                .collect();
            if endpoints.is_empty() {
                return Err(invalid("upstream", "endpoints", v, "at least one URL is required"));
            }
            if let Some(bad) = endpoints
                .iter()
                .find(|e| !(e.starts_with("http://") || e.starts_with("https://")))
            {
                return Err(invalid(
                    "upstream",
                    "endpoints",
                    bad,
                    "endpoints must be http:// or https:// URLs",
                ));
            }
            config.upstream.endpoints = endpoints;
        }
        if let Some(v) = section.get("timeout_secs") {
            config.upstream.timeout_secs = parse_positive("upstream", "timeout_secs", v)?;
        }
        if let Some(v) = section.get("territory") {
            let v = v.trim();
            if v.len() != 2 || !v.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(invalid(
                    "upstream",
                    "territory",
                    v,
                    "must be a two-letter ISO 3166-1 code",
                ));
            }
            config.upstream.territory = v.to_ascii_uppercase();
        }
        if let Some(v) = section.get("user_agent") {
            let v = v.trim();
            if !v.is_empty() {
                config.upstream.user_agent = v.to_string();
            }
        }
    }

    // [cache] section
    if let Some(section) = ini.section(Some("cache")) {
        if let Some(v) = section.get("key_precision") {
            let precision: u8 = v.trim().parse().map_err(|_| {
                invalid("cache", "key_precision", v, "must be an integer from 0 to 6")
            })?;
            config.cache.key_precision = precision.min(MAX_KEY_PRECISION);
        }
        if let Some(v) = section.get("bbox_ttl_secs") {
            config.cache.bbox_ttl_secs = parse_positive("cache", "bbox_ttl_secs", v)?;
        }
        if let Some(v) = section.get("bbox_stale_ttl_secs") {
            config.cache.bbox_stale_ttl_secs = parse_positive("cache", "bbox_stale_ttl_secs", v)?;
        }
        if let Some(v) = section.get("territory_ttl_secs") {
            config.cache.territory_ttl_secs = parse_positive("cache", "territory_ttl_secs", v)?;
        }
        if let Some(v) = section.get("territory_stale_ttl_secs") {
            config.cache.territory_stale_ttl_secs =
                parse_positive("cache", "territory_stale_ttl_secs", v)?;
        }
        if let Some(v) = section.get("snapshot_ttl_secs") {
            config.cache.snapshot_ttl_secs = parse_positive("cache", "snapshot_ttl_secs", v)?;
        }
        if let Some(v) = section.get("max_size_mb") {
            config.cache.max_size_mb = parse_positive("cache", "max_size_mb", v)?;
        }
    }

    // [records] section
    if let Some(section) = ini.section(Some("records")) {
        config.records.curated_file = section.get("curated_file").and_then(parse_path);
        config.records.operator_file = section.get("operator_file").and_then(parse_path);
        config.records.community_file = section.get("community_file").and_then(parse_path);
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("enabled") {
            config.logging.enabled = parse_bool("logging", "enabled", v)?;
        }
        if let Some(v) = section.get("detail") {
            config.logging.detail = parse_bool("logging", "detail", v)?;
        }
        if let Some(path) = section.get("directory").and_then(parse_path) {
            config.logging.directory = path;
        }
    }

    Ok(config)
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_positive(section: &str, key: &str, value: &str) -> Result<u64, ConfigFileError> {
    match value.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(invalid(section, key, value, "must be a positive integer")),
    }
}

fn parse_bool(section: &str, key: &str, value: &str) -> Result<bool, ConfigFileError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(invalid(section, key, value, "must be true or false")),
    }
}

/// Returns `None` for blank values; expands a leading `~`.
fn parse_path(value: &str) -> Option<PathBuf> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    Some(expand_tilde(value))
}

fn expand_tilde(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}
