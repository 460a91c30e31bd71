//! Logging infrastructure for poilayer.
//!
//! Structured logging to a session log file and to stderr:
//! - Writes to `logs/poilayer.log` (cleared on session start)
//! - Mirrors events to stderr so stdout stays clean for JSON output
//! - Configurable via the RUST_LOG environment variable

use std::fs;
use std::io;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;


/// Guard that must be kept alive for the duration of logging.
///
/// Dropping this guard flushes and closes the log file writer.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Initialize the global subscriber.
///
/// Creates `log_dir` if needed, truncates `log_file` inside it, and installs
/// a file layer plus a stderr layer. The filter defaults to `info` when
/// RUST_LOG is unset.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the file cannot
/// be truncated.
pub fn init_logging(log_dir: &Path, log_file: &str) -> Result<LoggingGuard, io::Error> {
    prepare_log_file(log_dir, log_file)?;

    let file_appender = tracing_appender::rolling::never(log_dir, log_file);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true);

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(true)
        .compact();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

/// Creates the log directory and clears the previous session's file.
fn prepare_log_file(log_dir: &Path, log_file: &str) -> io::Result<()> {
    fs::create_dir_all(log_dir)?;
    fs::write(log_dir.join(log_file), "")
}
