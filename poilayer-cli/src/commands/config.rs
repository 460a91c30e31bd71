//! Configuration management CLI commands.
//!
//! Provides `config get`, `config set`, `config list`, and `config path` commands
//! for viewing and modifying configuration settings from the command line.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use poilayer::config::{config_file_path, ConfigFile, ConfigKey};

use crate::error::CliError;
use crate::runner::load_config;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Get a configuration value
    Get {
        /// Configuration key in format section.key (e.g., cache.key_precision)
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key in format section.key (e.g., cache.key_precision)
        key: String,

        /// Value to set
        value: String,
    },

    /// List all configuration settings
    List,

    /// Show the configuration file path
    Path,
}

/// Run a config subcommand against `path` or the default config file.
pub fn run(command: ConfigCommands, path: Option<&Path>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Get { key } => {
            let config = load_config(path)?;
            println!("{}", display_value(&get_value(&config, &key)?));
            Ok(())
        }
        ConfigCommands::Set { key, value } => {
            let target = resolve_path(path);
            let name = set_value(&target, &key, &value)?;
            println!("Set {} = {}", name, value);
            Ok(())
        }
        ConfigCommands::List => {
            let config = load_config(path)?;
            print!("{}", render_list(&config));
            Ok(())
        }
        ConfigCommands::Path => {
            println!("{}", resolve_path(path).display());
            Ok(())
        }
    }
}

fn resolve_path(path: Option<&Path>) -> PathBuf {
    path.map(Path::to_path_buf)
        .unwrap_or_else(config_file_path)
}

fn parse_key(key: &str) -> Result<ConfigKey, CliError> {
    key.parse().map_err(|_| {
        CliError::Config(format!(
            "Unknown configuration key '{}'. Use 'poilayer config list' to see available keys.",
            key
        ))
    })
}

fn get_value(config: &ConfigFile, key: &str) -> Result<String, CliError> {
    Ok(parse_key(key)?.get(config))
}

/// Validates and persists one value; returns the canonical key name.
fn set_value(path: &Path, key: &str, value: &str) -> Result<&'static str, CliError> {
    let config_key = parse_key(key)?;
    let mut config = ConfigFile::load_from(path)?;
    config_key.set(&mut config, value)?;
    config.save_to(path)?;
    Ok(config_key.name())
}

fn display_value(value: &str) -> &str {
    if value.is_empty() {
        "(not set)"
    } else {
        value
    }
}

fn render_list(config: &ConfigFile) -> String {
    let mut out = String::from("Configuration Settings\n======================\n");
    let mut current_section = "";

    for key in ConfigKey::all() {
        let section = key.section();
        if section != current_section {
            out.push('\n');
            out.push_str(&format!("[{}]\n", section));
            current_section = section;
        }
        out.push_str(&format!(
            "  {} = {}\n",
            key.key_name(),
            display_value(&key.get(config))
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_persists_value() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.ini");

        let name = set_value(&path, "Cache.Snapshot_TTL_Secs", "30").unwrap();

        assert_eq!(name, "cache.snapshot_ttl_secs");
        let config = ConfigFile::load_from(&path).unwrap();
        assert_eq!(config.cache.snapshot_ttl_secs, 30);
    }

    #[test]
    fn test_set_rejects_unknown_key() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.ini");

        let err = set_value(&path, "cache.ttl", "30").unwrap_err();

        assert!(err.to_string().contains("Unknown configuration key"));
        assert!(!path.exists());
    }

    #[test]
    fn test_set_rejects_invalid_value() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.ini");

        assert!(set_value(&path, "upstream.territory", "Korea").is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_list_groups_keys_by_section() {
        let listing = render_list(&ConfigFile::default());

        assert!(listing.contains("[upstream]\n  endpoints = "));
        assert!(listing.contains("[records]\n  curated_file = (not set)"));
        assert!(listing.contains("  key_precision = 2"));
    }
}
