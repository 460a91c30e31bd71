//! Init command - initialize configuration file.

use std::path::Path;

use poilayer::config::{config_file_path, ConfigFile};

use crate::error::CliError;

/// Run the init command.
///
/// Writes a commented config file with defaults, keeping any values
/// already present.
pub fn run(path: Option<&Path>) -> Result<(), CliError> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(config_file_path);

    let existed = path.exists();
    let config = ConfigFile::load_from(&path)?;
    config.save_to(&path)?;

    if existed {
        println!("Updated configuration file: {}", path.display());
    } else {
        println!("Created configuration file: {}", path.display());
    }
    println!();
    println!("Edit this file to set upstream endpoints, cache windows and record files.");
    println!("Use 'poilayer config list' to review the current values.");
    Ok(())
}
