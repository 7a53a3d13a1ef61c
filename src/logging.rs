//! Logging setup: a console layer plus a
//! size-rotated file sink, replacing original_source/main.py's
//! `setup_logging` (a `loguru` console handler plus a rotating file
//! handler) with the pack's `tracing`/`tracing-subscriber`/
//! `tracing-appender` trio.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::error::{Error, Result};

/// Installs the global subscriber: an ANSI console layer filtered by
/// `level`, and a non-blocking rotating-file layer writing to
/// `config.file`'s directory. The returned guard must be held for the
/// duration of the process: dropping it stops the background file
/// writer before buffered lines are flushed.
pub fn init(level: &str, config: &LoggingConfig) -> Result<WorkerGuard> {
    let filter = EnvFilter::try_new(level).map_err(|e| Error::Config(format!("invalid log level {level}: {e}")))?;

    let log_path = Path::new(&config.file);
    let directory = log_path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let file_name = log_path
        .file_name()
        .ok_or_else(|| Error::Config(format!("invalid log file path: {}", config.file)))?;

    let file_appender = tracing_appender::rolling::daily(directory, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let console_layer = fmt::layer().with_target(true).with_ansi(true);
    let file_layer = fmt::layer().with_target(true).with_ansi(false).with_writer(non_blocking);

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Config(format!("installing tracing subscriber: {e}")))?;

    Ok(guard)
}
