use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::error::AppError;

/// Rotated log files kept next to the active one
const MAX_LOG_FILES: usize = 20;

/// Daily-rotated appender writing `<file name>.<date>` files beside
/// `log_path`, pruning all but the newest [`MAX_LOG_FILES`].
pub fn file_appender(log_path: &Path) -> Result<RollingFileAppender, AppError> {
    let file_name = log_path
        .file_name()
        .ok_or_else(|| {
            AppError::InvalidInput(format!("log path {log_path:?} has no file name"))
        })?;
    let dir = match log_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(file_name.to_string_lossy())
        .max_log_files(MAX_LOG_FILES)
        .build(dir)
        .map_err(|e| AppError::Initialization(format!("log file {log_path:?}: {e}")))
}

/// Install the global subscriber: JSON lines to `log_path`, plus a
/// human-readable stdout copy when verbose.
///
/// The returned guard flushes the file writer on drop and must be held for
/// the lifetime of the process.
pub fn init(log_path: &Path, verbose: bool) -> Result<WorkerGuard, AppError> {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let (writer, guard) = tracing_appender::non_blocking(file_appender(log_path)?);

    let file_layer = fmt::layer().json().with_writer(writer).with_ansi(false);
    let console_layer = verbose.then(|| fmt::layer().with_writer(std::io::stdout));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| AppError::Initialization(e.to_string()))?;

    Ok(guard)
}
