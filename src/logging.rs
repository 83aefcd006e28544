//! Console and rotating file log sinks
//!
//! Two layers share the same filter: a compact console layer and a
//! plain-text file layer rotated daily under the configured log directory.
//! File writes happen on a background worker; the returned guard flushes it
//! and must live until the process exits.

use crate::{Result, SweepError};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Base name of the rotating log file
pub const LOG_FILE_NAME: &str = "catalog-sweep.log";

/// Filter directives for a verbosity level
///
/// `quiet` wins over `verbose`.
pub fn default_directives(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "catalog_sweep=info,warn",
        1 => "catalog_sweep=debug,info",
        2 => "catalog_sweep=trace,debug",
        _ => "trace",
    }
}

/// `RUST_LOG` when set, the verbosity defaults otherwise
fn build_filter(verbose: u8, quiet: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose, quiet)))
}

/// Installs the global subscriber
///
/// # Arguments
///
/// * `log_dir` - Directory for `catalog-sweep.log.<date>` files, created if missing
/// * `verbose` - Number of `-v` flags
/// * `quiet` - Only report errors
///
/// # Errors
///
/// Fails when the log directory cannot be created or a subscriber is
/// already installed.
pub fn init_logging(log_dir: &Path, verbose: u8, quiet: bool) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_NAME);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_target(true)
        .with_ansi(false)
        .compact()
        .with_filter(build_filter(verbose, quiet));

    let console_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .compact()
        .with_filter(build_filter(verbose, quiet));

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| SweepError::Logging(e.to_string()))?;

    tracing::debug!("Writing logs to {}", log_dir.join(LOG_FILE_NAME).display());
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directives_by_verbosity() {
        assert_eq!(default_directives(0, false), "catalog_sweep=info,warn");
        assert_eq!(default_directives(1, false), "catalog_sweep=debug,info");
        assert_eq!(default_directives(2, false), "catalog_sweep=trace,debug");
        assert_eq!(default_directives(5, false), "trace");
    }

    #[test]
    fn test_quiet_wins() {
        assert_eq!(default_directives(2, true), "error");
    }
}
