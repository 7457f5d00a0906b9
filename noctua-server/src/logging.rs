//! Tracing setup for the server
//!
//! Logs go to stderr, and also to a log file when one is configured.

use std::path::Path;
use std::sync::{Once, OnceLock};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub const DEFAULT_FILTER: &str = "info,noctua_core=debug,noctua_server=debug,llm=info";

static INIT: Once = Once::new();
// Keeps the file writer flushing until exit
static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// `RUST_LOG` wins, then `level`, then [`DEFAULT_FILTER`]
fn filter(level: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| match level {
        Some(level) => EnvFilter::try_new(level).unwrap_or_else(|e| {
            eprintln!("[noctua] Invalid log level {:?}: {}", level, e);
            EnvFilter::new(DEFAULT_FILTER)
        }),
        None => EnvFilter::new(DEFAULT_FILTER),
    })
}

/// Install the global subscriber. Later calls do nothing.
pub fn init_logging(log_file: Option<&Path>, level: Option<&str>) {
    INIT.call_once(|| {
        let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(true);

        let file_layer = log_file.and_then(|path| {
            if let Some(parent) = path.parent() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    eprintln!("[noctua] Failed to create log directory {:?}: {}", parent, e);
                }
            }

            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path);
            match file {
                Ok(file) => {
                    let (non_blocking, guard) = tracing_appender::non_blocking(file);
                    let _ = LOG_GUARD.set(guard);
                    Some(
                        fmt::layer()
                            .with_writer(non_blocking)
                            .with_ansi(false)
                            .with_target(true)
                            .with_file(true)
                            .with_line_number(true),
                    )
                }
                Err(e) => {
                    eprintln!("[noctua] Failed to open log file {:?}: {}", path, e);
                    None
                }
            }
        });

        let subscriber = tracing_subscriber::registry()
            .with(filter(level))
            .with(stderr_layer)
            .with(file_layer);

        if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
            eprintln!("[noctua] Failed to set tracing subscriber: {}", e);
            return;
        }
        match log_file {
            Some(path) => tracing::info!("Logging initialized, writing to {:?}", path),
            None => tracing::info!("Logging initialized, stderr only"),
        }
    });
}
