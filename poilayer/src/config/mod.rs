//! INI configuration for the pipeline and its collaborators.
//!
//! # Example
//!
//! ```
//! use poilayer::config::ConfigFile;
//!
//! let config = ConfigFile::default();
//! let pipeline_config = config.to_pipeline_config();
//! assert_eq!(pipeline_config.key_precision, 2);
//! ```

mod defaults;
mod file;
mod keys;
mod parser;
mod settings;
mod writer;

pub use defaults::*;
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use keys::{ConfigKey, ConfigKeyError};
pub use settings::{CacheSettings, ConfigFile, LoggingSettings, RecordsSettings, UpstreamSettings};
