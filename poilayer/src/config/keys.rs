//! Configuration key access and validation.
//!
//! Type-safe get/set of configuration values by `section.key` name, used by
//! the `config get|set|list` CLI commands.

use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use super::settings::ConfigFile;
use crate::region::MAX_KEY_PRECISION;

/// Errors that can occur when getting or setting configuration values.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigKeyError {
    /// Unknown configuration key.
    #[error("Unknown configuration key '{0}'")]
    UnknownKey(String),

    /// Validation failed for the value.
    #[error("Invalid value for {key}: {reason}")]
    ValidationFailed { key: String, reason: String },
}

/// Supported configuration keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    UpstreamEndpoints,
    UpstreamTimeoutSecs,
    UpstreamTerritory,
    UpstreamUserAgent,

    CacheKeyPrecision,
    CacheBboxTtlSecs,
    CacheBboxStaleTtlSecs,
    CacheTerritoryTtlSecs,
    CacheTerritoryStaleTtlSecs,
    CacheSnapshotTtlSecs,
    CacheMaxSizeMb,

    RecordsCuratedFile,
    RecordsOperatorFile,
    RecordsCommunityFile,

    LoggingEnabled,
    LoggingDetail,
    LoggingDirectory,
}

const ALL_KEYS: &[ConfigKey] = &[
    ConfigKey::UpstreamEndpoints,
    ConfigKey::UpstreamTimeoutSecs,
    ConfigKey::UpstreamTerritory,
    ConfigKey::UpstreamUserAgent,
    ConfigKey::CacheKeyPrecision,
    ConfigKey::CacheBboxTtlSecs,
    ConfigKey::CacheBboxStaleTtlSecs,
    ConfigKey::CacheTerritoryTtlSecs,
    ConfigKey::CacheTerritoryStaleTtlSecs,
    ConfigKey::CacheSnapshotTtlSecs,
    ConfigKey::CacheMaxSizeMb,
    ConfigKey::RecordsCuratedFile,
    ConfigKey::RecordsOperatorFile,
    ConfigKey::RecordsCommunityFile,
    ConfigKey::LoggingEnabled,
    ConfigKey::LoggingDetail,
    ConfigKey::LoggingDirectory,
];

impl FromStr for ConfigKey {
    type Err = ConfigKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        ALL_KEYS
            .iter()
            .copied()
            .find(|key| key.name() == wanted)
            .ok_or_else(|| ConfigKeyError::UnknownKey(s.to_string()))
    }
}

impl ConfigKey {
    /// Every key, in `config.ini` order.
    pub fn all() -> &'static [ConfigKey] {
        ALL_KEYS
    }

    /// Get the canonical key name (e.g., "cache.key_precision").
    pub fn name(&self) -> &'static str {
        match self {
            ConfigKey::UpstreamEndpoints => "upstream.endpoints",
            ConfigKey::UpstreamTimeoutSecs => "upstream.timeout_secs",
            ConfigKey::UpstreamTerritory => "upstream.territory",
            ConfigKey::UpstreamUserAgent => "upstream.user_agent",
            ConfigKey::CacheKeyPrecision => "cache.key_precision",
            ConfigKey::CacheBboxTtlSecs => "cache.bbox_ttl_secs",
            ConfigKey::CacheBboxStaleTtlSecs => "cache.bbox_stale_ttl_secs",
            ConfigKey::CacheTerritoryTtlSecs => "cache.territory_ttl_secs",
            ConfigKey::CacheTerritoryStaleTtlSecs => "cache.territory_stale_ttl_secs",
            ConfigKey::CacheSnapshotTtlSecs => "cache.snapshot_ttl_secs",
            ConfigKey::CacheMaxSizeMb => "cache.max_size_mb",
            ConfigKey::RecordsCuratedFile => "records.curated_file",
            ConfigKey::RecordsOperatorFile => "records.operator_file",
            ConfigKey::RecordsCommunityFile => "records.community_file",
            ConfigKey::LoggingEnabled => "logging.enabled",
            ConfigKey::LoggingDetail => "logging.detail",
            ConfigKey::LoggingDirectory => "logging.directory",
        }
    }

    /// Get the section name (e.g., "cache").
    pub fn section(&self) -> &'static str {
        self.name().split('.').next().unwrap_or("")
    }

    /// Get the key name within the section (e.g., "key_precision").
    pub fn key_name(&self) -> &'static str {
        self.name().split('.').nth(1).unwrap_or(self.name())
    }

    /// Get the value from a config file as a string.
    pub fn get(&self, config: &ConfigFile) -> String {
        match self {
            ConfigKey::UpstreamEndpoints => config.upstream.endpoints.join(", "),
            ConfigKey::UpstreamTimeoutSecs => config.upstream.timeout_secs.to_string(),
            ConfigKey::UpstreamTerritory => config.upstream.territory.clone(),
            ConfigKey::UpstreamUserAgent => config.upstream.user_agent.clone(),
            ConfigKey::CacheKeyPrecision => config.cache.key_precision.to_string(),
            ConfigKey::CacheBboxTtlSecs => config.cache.bbox_ttl_secs.to_string(),
            ConfigKey::CacheBboxStaleTtlSecs => config.cache.bbox_stale_ttl_secs.to_string(),
            ConfigKey::CacheTerritoryTtlSecs => config.cache.territory_ttl_secs.to_string(),
            ConfigKey::CacheTerritoryStaleTtlSecs => {
                config.cache.territory_stale_ttl_secs.to_string()
            }
            ConfigKey::CacheSnapshotTtlSecs => config.cache.snapshot_ttl_secs.to_string(),
            ConfigKey::CacheMaxSizeMb => config.cache.max_size_mb.to_string(),
            ConfigKey::RecordsCuratedFile => optional_path_display(&config.records.curated_file),
            ConfigKey::RecordsOperatorFile => optional_path_display(&config.records.operator_file),
            ConfigKey::RecordsCommunityFile => {
                optional_path_display(&config.records.community_file)
            }
            ConfigKey::LoggingEnabled => config.logging.enabled.to_string(),
            ConfigKey::LoggingDetail => config.logging.detail.to_string(),
            ConfigKey::LoggingDirectory => config.logging.directory.display().to_string(),
        }
    }

    /// Validate `value` and store it in `config`.
    ///
    /// `config` is untouched when validation fails.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigKeyError> {
        let value = value.trim();
        match self {
            ConfigKey::UpstreamEndpoints => {
                let endpoints: Vec<String> = value
                    .split(',')
                    .map(str::trim)
                    .filter(|e| !e.is_empty())
                    .map(str::to_string)
                    .collect();
                if endpoints.is_empty() {
                    return Err(self.invalid("at least one URL is required"));
                }
                if endpoints
                    .iter()
                    .any(|e| !(e.starts_with("http://") || e.starts_with("https://")))
                {
                    return Err(self.invalid("endpoints must be http:// or https:// URLs"));
                }
                config.upstream.endpoints = endpoints;
            }
            ConfigKey::UpstreamTimeoutSecs => {
                config.upstream.timeout_secs = self.positive(value)?;
            }
            ConfigKey::UpstreamTerritory => {
                if value.len() != 2 || !value.chars().all(|c| c.is_ascii_alphabetic()) {
                    return Err(self.invalid("must be a two-letter ISO 3166-1 code"));
                }
                config.upstream.territory = value.to_ascii_uppercase();
            }
            ConfigKey::UpstreamUserAgent => {
                if value.is_empty() {
                    return Err(self.invalid("must not be empty"));
                }
                config.upstream.user_agent = value.to_string();
            }
            ConfigKey::CacheKeyPrecision => {
                let precision: u8 = value
                    .parse()
                    .ok()
                    .filter(|p| *p <= MAX_KEY_PRECISION)
                    .ok_or_else(|| self.invalid("must be an integer from 0 to 6"))?;
                config.cache.key_precision = precision;
            }
            ConfigKey::CacheBboxTtlSecs => config.cache.bbox_ttl_secs = self.positive(value)?,
            ConfigKey::CacheBboxStaleTtlSecs => {
                config.cache.bbox_stale_ttl_secs = self.positive(value)?
            }
            ConfigKey::CacheTerritoryTtlSecs => {
                config.cache.territory_ttl_secs = self.positive(value)?
            }
            ConfigKey::CacheTerritoryStaleTtlSecs => {
                config.cache.territory_stale_ttl_secs = self.positive(value)?
            }
            ConfigKey::CacheSnapshotTtlSecs => {
                config.cache.snapshot_ttl_secs = self.positive(value)?
            }
            ConfigKey::CacheMaxSizeMb => config.cache.max_size_mb = self.positive(value)?,
            ConfigKey::RecordsCuratedFile => config.records.curated_file = optional_path(value),
            ConfigKey::RecordsOperatorFile => config.records.operator_file = optional_path(value),
            ConfigKey::RecordsCommunityFile => {
                config.records.community_file = optional_path(value)
            }
            ConfigKey::LoggingEnabled => config.logging.enabled = self.boolean(value)?,
            ConfigKey::LoggingDetail => config.logging.detail = self.boolean(value)?,
            ConfigKey::LoggingDirectory => {
                config.logging.directory = optional_path(value)
                    .ok_or_else(|| self.invalid("must not be empty"))?;
            }
        }
        Ok(())
    }

    fn invalid(&self, reason: &str) -> ConfigKeyError {
        ConfigKeyError::ValidationFailed {
            key: self.name().to_string(),
            reason: reason.to_string(),
        }
    }

    fn positive(&self, value: &str) -> Result<u64, ConfigKeyError> {
        value
            .parse::<u64>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| self.invalid("must be a positive integer"))
    }

    fn boolean(&self, value: &str) -> Result<bool, ConfigKeyError> {
        match value.to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" => Ok(false),
            _ => Err(self.invalid("must be true or false")),
        }
    }
}

fn optional_path(value: &str) -> Option<PathBuf> {
    if value.is_empty() {
        return None;
    }
    match value.strip_prefix("~/") {
        Some(rest) => dirs::home_dir().map(|home| home.join(rest)),
        None => Some(PathBuf::from(value)),
    }
}

fn optional_path_display(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_default()
}
