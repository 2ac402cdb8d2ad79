//! Pipeline progress logging.
//!
//! The pipeline reports each step through `log_info` / `log_success` /
//! `log_warning` / `log_error`. They emit `tracing` events under the
//! `spore` target; the CLI installs the subscriber with [`init_logging`].

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log level for pipeline messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Emit one pipeline message.
pub fn log(level: LogLevel, message: &str) {
    match level {
        LogLevel::Info => tracing::info!(target: "spore", "{}", message),
        LogLevel::Success => tracing::info!(target: "spore", "✓ {}", message),
        LogLevel::Warning => tracing::warn!(target: "spore", "{}", message),
        LogLevel::Error => tracing::error!(target: "spore", "{}", message),
    }
}

pub fn log_info(msg: impl Into<String>) {
    log(LogLevel::Info, &msg.into());
}

pub fn log_success(msg: impl Into<String>) {
    log(LogLevel::Success, &msg.into());
}

pub fn log_warning(msg: impl Into<String>) {
    log(LogLevel::Warning, &msg.into());
}

pub fn log_error(msg: impl Into<String>) {
    log(LogLevel::Error, &msg.into());
}

/// Install the console subscriber.
///
/// `RUST_LOG` takes precedence; otherwise `spore=info`, or `spore=debug`
/// when `verbose` is set.
pub fn init_logging(verbose: bool) {
    let default = if verbose { "spore=debug" } else { "spore=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // A second call (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init();
}
