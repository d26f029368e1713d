use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::SyncConfig;

/// Initializes the logging system with file + console output.
/// Returns a guard that must be kept alive for the duration of the app.
///
/// `level` is the fallback directive used when `RUST_LOG` is not set.
pub fn init_logging(level: &str) -> Result<WorkerGuard> {
    let logs_dir = SyncConfig::logs_dir()?;
    std::fs::create_dir_all(&logs_dir)?;

    // File appender: daily rotation
    let file_appender = tracing_appender::rolling::daily(&logs_dir, "monad-sync");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .compact(),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))?;

    Ok(guard)
}

/// Initialize logging to a custom directory with a custom filter.
/// Useful for tests or embedded scenarios where `~/.monad-sync/logs` is not desired.
pub fn init_logging_to_dir(logs_dir: &std::path::Path, filter: &str) -> Result<WorkerGuard> {
    std::fs::create_dir_all(logs_dir)?;

    let file_appender = tracing_appender::rolling::daily(logs_dir, "monad-sync");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))?;

    Ok(guard)
}

/// Base level for everything, with the workspace crates one notch more
/// verbose when the base is `info`.
fn default_directives(level: &str) -> String {
    if level.eq_ignore_ascii_case("info") {
        "info,monad_app=debug,monad_sync=debug,monad_chain=debug,monad_core=debug".to_string()
    } else {
        level.to_string()
    }
}
