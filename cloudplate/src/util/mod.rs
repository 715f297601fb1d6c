//! Logging setup.

use std::path::Path;
use std::sync::OnceLock;

use cloudplate_shared::errors::{CloudplateError, CloudplateResult};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Log file name inside the logs directory; rotated daily.
pub const LOG_FILE_PREFIX: &str = "cloudplate.log";

/// Keeps the file writer flushing for the process lifetime.
static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the global subscriber: human output on stderr plus a daily
/// rotated file under `logs_dir`.
///
/// Filter comes from `RUST_LOG`, defaulting to `default_level`. Only the
/// first call installs anything.
pub fn init_logging(logs_dir: &Path, default_level: &str) -> CloudplateResult<()> {
    std::fs::create_dir_all(logs_dir).map_err(|e| {
        CloudplateError::Storage(format!(
            "Failed to create logs directory {}: {}",
            logs_dir.display(),
            e
        ))
    })?;

    if LOG_GUARD.get().is_some() {
        return Ok(());
    }

    let file_appender = tracing_appender::rolling::daily(logs_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if LOG_GUARD.set(guard).is_ok() {
        register_to_tracing(non_blocking, env_filter);
    }
    Ok(())
}

/// File layer without colors, stderr layer with them.
pub fn register_to_tracing(non_blocking: NonBlocking, env_filter: EnvFilter) {
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .with_ansi(false),
        )
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_multiple_times() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");

        init_logging(&logs, "info").unwrap();
        init_logging(&logs, "debug").unwrap();

        assert!(logs.is_dir());
    }
}
