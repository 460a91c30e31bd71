//! poilayer CLI - Command-line interface
//!
//! Runs merged point-of-interest lookups against the configured upstream
//! and manages the configuration file.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::config::ConfigCommands;
use commands::query::QueryArgs;

#[derive(Parser)]
#[command(name = "poilayer")]
#[command(version, about = "Cached, merged point-of-interest layers", long_about = None)]
struct Cli {
    /// Path to config.ini (default: ~/.poilayer/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch merged elements for a region and print them as JSON
    Query {
        /// Bounding box as minLon,minLat,maxLon,maxLat (default: whole territory)
        #[arg(long, allow_hyphen_values = true)]
        bbox: Option<String>,

        /// Run the same query this many times (later runs hit the caches)
        #[arg(long, default_value = "1")]
        repeat: u32,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Create or refresh the configuration file
    Init,

    /// View or modify configuration settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Query {
            bbox,
            repeat,
            pretty,
        } => {
            commands::query::run(QueryArgs {
                config: cli.config,
                bbox,
                repeat,
                pretty,
            })
            .await
        }
        Commands::Init => commands::init::run(cli.config.as_deref()),
        Commands::Config { command } => commands::config::run(command, cli.config.as_deref()),
    };

    if let Err(e) = result {
        e.exit();
    }
}
