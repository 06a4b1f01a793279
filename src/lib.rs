//! ExecWire Execution Service Client Library
//!
//! A streaming client for a remote, sandboxed code execution service:
//! interactive WebSocket sessions with live output and stdin forwarding,
//! plus a one-shot batch execution path over HTTP.

pub mod batch;
pub mod cli;
pub mod config;
pub mod protocol;
pub mod session;

use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;

/// Initialize the tracing subscriber: an stderr layer plus a daily-rolling
/// file layer. Logs go to stderr so they never interleave with program
/// output on stdout.
///
/// The returned guard must stay alive for the life of the process or
/// buffered file output is lost. If the log file cannot be opened, file
/// logging is skipped and `None` is returned.
pub fn init_logging(level: &str, log: &config::LogConfig) -> Option<WorkerGuard> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("execwire={}", level).into());

    let (file_layer, guard) = match rolling_writer(Path::new(&log.file_path)) {
        Ok((writer, guard)) => {
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        Err(e) => {
            eprintln!("File logging disabled: {}", e);
            (None, None)
        }
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    guard
}

fn rolling_writer(
    path: &Path,
) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let directory = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(directory)
        .with_context(|| format!("Failed to create log directory: {}", directory.display()))?;

    let file_name = path
        .file_name()
        .with_context(|| format!("Log path has no file name: {}", path.display()))?;

    Ok(tracing_appender::non_blocking(tracing_appender::rolling::daily(directory, file_name)))
}
