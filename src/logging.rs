//! Logging helpers
//!
//! Thin message-string wrappers around `tracing`, plus the subscriber setup
//! shared by the parent and child processes.

use crate::config::RELAY_TARGET;
use anyhow::Result;
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub fn debug(message: impl AsRef<str>) {
    tracing::debug!("{}", message.as_ref());
}

pub fn info(message: impl AsRef<str>) {
    tracing::info!("{}", message.as_ref());
}

pub fn warn(message: impl AsRef<str>) {
    tracing::warn!("{}", message.as_ref());
}

/// Filter directive keeping relayed output visible at any configured level.
pub fn relay_directive() -> String {
    format!("{RELAY_TARGET}=info")
}

/// Initialize the logging system
///
/// # Arguments
/// * `log_level` - filter directive (trace, debug, info, ...); falls back to `RUST_LOG`
/// * `log_file` - when set, events are also appended to this file without ANSI colors
///
/// Events under [`RELAY_TARGET`] stay enabled at info even when the filter is stricter.
///
/// A child process passes its `-log_to` path here, so everything it logs ends
/// up both on stdout (relayed by the parent) and in its own log file.
pub fn init_logger(log_level: Option<&str>, log_file: Option<PathBuf>) -> Result<()> {
    let env_filter = if let Some(level) = log_level {
        EnvFilter::try_new(level)?
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,pagefork=debug"))
    };
    let env_filter = env_filter.add_directive(relay_directive().parse()?);

    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_ansi(log_file.is_none() && std::io::stdout().is_terminal())
        .compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer);

    if let Some(log_path) = log_file {
        if let Some(parent) = log_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        let file_layer = fmt::layer()
            .with_writer(std::sync::Arc::new(file))
            .with_target(false)
            .with_ansi(false)
            .with_level(true);

        registry.with(file_layer).try_init()?;
    } else {
        registry.try_init()?;
    }

    Ok(())
}
