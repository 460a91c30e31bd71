//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;

use poilayer::config::{ConfigFileError, ConfigKeyError};
use poilayer::pipeline::PipelineError;
use poilayer::provider::ProviderError;
use poilayer::records::RecordError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Failed to build the upstream HTTP client
    Upstream(ProviderError),
    /// Failed to load internal record files
    Records(RecordError),
    /// A pipeline request failed
    Pipeline(PipelineError),
    /// Failed to render the result
    Output(serde_json::Error),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Pipeline(PipelineError::InvalidRegion(_)) => {
                eprintln!();
                eprintln!("Expected --bbox minLon,minLat,maxLon,maxLat, for example:");
                eprintln!("  poilayer query --bbox 126.9,37.5,127.1,37.6");
            }
            CliError::Records(_) => {
                eprintln!();
                eprintln!("Record files must contain a JSON array of rows.");
                eprintln!("Check the [records] section of the config file.");
            }
            _ => {}
        }

        process::exit(match self {
            CliError::Config(_) => 2,
            _ => 1,
        })
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Upstream(e) => write!(f, "Failed to create upstream client: {}", e),
            CliError::Records(e) => write!(f, "Failed to load records: {}", e),
            CliError::Pipeline(e) => write!(f, "Request failed: {}", e),
            CliError::Output(e) => write!(f, "Failed to render output: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Upstream(e) => Some(e),
            CliError::Records(e) => Some(e),
            CliError::Pipeline(e) => Some(e),
            CliError::Output(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<ConfigKeyError> for CliError {
    fn from(e: ConfigKeyError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<ProviderError> for CliError {
    fn from(e: ProviderError) -> Self {
        CliError::Upstream(e)
    }
}

impl From<RecordError> for CliError {
    fn from(e: RecordError) -> Self {
        CliError::Records(e)
    }
}

impl From<PipelineError> for CliError {
    fn from(e: PipelineError) -> Self {
        CliError::Pipeline(e)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Output(e)
    }
}
