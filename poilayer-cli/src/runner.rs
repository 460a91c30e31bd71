//! CLI runner for common setup.
//!
//! Loads the configuration file and initializes logging for commands that
//! talk to the upstream service.

use std::path::Path;

use tracing::info;

use poilayer::config::{ConfigFile, DEFAULT_LOG_FILE};
use poilayer::logging::{init_logging, LoggingGuard};

use crate::error::CliError;

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Keeps the log writer alive while the runner exists
    _logging_guard: LoggingGuard,
    config: ConfigFile,
}

impl CliRunner {
    /// Loads the config (defaults when absent) and starts logging.
    pub fn new(config_path: Option<&Path>) -> Result<Self, CliError> {
        let config = load_config(config_path)?;

        let logging_guard = init_logging(&config.logging.directory, DEFAULT_LOG_FILE)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            _logging_guard: logging_guard,
            config,
        })
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("poilayer v{}", env!("CARGO_PKG_VERSION"));
        info!(
            endpoints = self.config.upstream.endpoints.len(),
            territory = %self.config.upstream.territory,
            "poilayer CLI: {} command",
            command
        );
    }
}

/// Loads the config from `path`, or from ~/.poilayer/config.ini.
pub fn load_config(path: Option<&Path>) -> Result<ConfigFile, CliError> {
    let config = match path {
        Some(path) => ConfigFile::load_from(path)?,
        None => ConfigFile::load()?,
    };
    Ok(config)
}
