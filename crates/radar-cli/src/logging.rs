//! Subscriber setup: terse stderr output plus a per-run debug log file.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, Layer};
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Everything from our own crates goes to the file; dependencies only at `info`.
const FILE_FILTER: &str = "info,radar=debug,radar_core=debug,radar_mcp=debug,radar_api=debug,radar_config=debug";

/// `radar_<YYYYmmdd_HHMMSS>.log` for the given local time.
pub fn log_file_name(now: chrono::DateTime<chrono::Local>) -> String {
    format!("radar_{}.log", now.format("%Y%m%d_%H%M%S"))
}

/// Install the global subscriber.
///
/// The stderr layer honors `RUST_LOG`, falling back to `debug` with
/// `verbose` and `info` otherwise. When `logs_dir` is given, a plain-text
/// file layer records debug output there; its path is returned.
pub fn init(verbose: bool, logs_dir: Option<&Path>) -> Result<Option<PathBuf>> {
    let level = if verbose { "debug" } else { "info" };
    let stderr_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .with_filter(stderr_filter);

    let (file_layer, path) = match logs_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let path = dir.join(log_file_name(chrono::Local::now()));
            let file = std::fs::File::create(&path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            let layer = fmt::layer()
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false)
                .with_filter(EnvFilter::new(FILE_FILTER));
            (Some(layer), Some(path))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install the tracing subscriber")?;

    if let Some(path) = &path {
        tracing::info!("Logging to {}", path.display());
    }
    Ok(path)
}
