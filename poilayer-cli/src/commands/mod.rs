//! CLI command handlers.

pub mod config;
pub mod init;
pub mod query;
