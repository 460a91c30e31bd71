//! Configuration file handling for ~/.poilayer/config.ini.
//!
//! Loads and saves user configuration with sensible defaults.
//! Settings structs live in [`super::settings`], constants in [`super::defaults`],
//! parsing in [`super::parser`], and serialization in [`super::writer`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use super::settings::ConfigFile;
use crate::cache::TtlPolicy;
use crate::pipeline::PipelineConfig;

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Failed to write config file
    #[error("Failed to write config file: {0}")]
    WriteError(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// Failed to create config directory
    #[error("Failed to create config directory: {0}")]
    DirectoryError(std::io::Error),
}

impl ConfigFile {
    /// Load configuration from the default path (~/.poilayer/config.ini).
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        super::parser::parse_ini(&ini)
    }

    /// Save configuration to the default path (~/.poilayer/config.ini).
    pub fn save(&self) -> Result<(), ConfigFileError> {
        self.save_to(&config_file_path())
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigFileError::DirectoryError)?;
        }

        let content = super::writer::to_config_string(self);
        std::fs::write(path, content).map_err(|e| ConfigFileError::WriteError(e.to_string()))
    }

    /// Builds the runtime pipeline configuration.
    ///
    /// Stale windows shorter than their fresh TTL are raised to it.
    pub fn to_pipeline_config(&self) -> PipelineConfig {
        let cache = &self.cache;
        PipelineConfig {
            key_precision: cache.key_precision,
            bbox_policy: TtlPolicy::new(
                Duration::from_secs(cache.bbox_ttl_secs),
                Duration::from_secs(cache.bbox_stale_ttl_secs),
            ),
            territory_policy: TtlPolicy::new(
                Duration::from_secs(cache.territory_ttl_secs),
                Duration::from_secs(cache.territory_stale_ttl_secs),
            ),
            snapshot_ttl: Duration::from_secs(cache.snapshot_ttl_secs),
            cache_size_bytes: cache.max_size_mb.saturating_mul(1024 * 1024),
            territory: self.upstream.territory.clone(),
            log_requests: self.logging.enabled,
            log_detail: self.logging.detail,
        }
        .with_key_precision(cache.key_precision)
    }

    /// Per-endpoint upstream timeout.
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream.timeout_secs)
    }
}

/// Get the path to the config directory (~/.poilayer).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".poilayer")
}

/// Get the path to the config file (~/.poilayer/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_MAX_SIZE_MB;

    #[test]
    fn test_load_nonexistent_returns_defaults() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.ini");

        let config = ConfigFile::load_from(&config_path).unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_save_then_load_preserves_values() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.ini");

        let mut config = ConfigFile::default();
        config.upstream.timeout_secs = 7;
        config.cache.key_precision = 3;
        config.records.curated_file = Some(PathBuf::from("/srv/curated.json"));
        config.logging.detail = false;
        config.save_to(&config_path).unwrap();

        let loaded = ConfigFile::load_from(&config_path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_default_file_contains_comments() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.ini");
        ConfigFile::default().save_to(&config_path).unwrap();

        let text = std::fs::read_to_string(&config_path).unwrap();
        assert!(text.contains("[upstream]"));
        assert!(text.contains("; Timeout for each endpoint attempt"));
        assert!(text.contains("overpass-api.de"));
    }

    #[test]
    fn test_to_pipeline_config_defaults() {
        let pipeline = ConfigFile::default().to_pipeline_config();
        assert_eq!(pipeline, PipelineConfig::default());
        assert_eq!(
            pipeline.cache_size_bytes,
            DEFAULT_MAX_SIZE_MB * 1024 * 1024
        );
    }

    #[test]
    fn test_to_pipeline_config_raises_short_stale_window() {
        let mut config = ConfigFile::default();
        config.cache.bbox_ttl_secs = 600;
        config.cache.bbox_stale_ttl_secs = 60;

        let pipeline = config.to_pipeline_config();
        assert_eq!(pipeline.bbox_policy.stale_ttl(), Duration::from_secs(600));
    }

    #[test]
    fn test_config_file_path() {
        let path = config_file_path();
        assert!(path.ends_with(".poilayer/config.ini"));
    }
}
