//! Tracing setup: a daily-rolling file under `LIBRADMIN_HOME/logs`, plus
//! stderr when verbose. Stdout stays reserved for command output.

use anyhow::{Context, Result};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{Config, paths};

/// Overrides `log_level` from the config file.
pub const LOG_ENV: &str = "LIBRADMIN_LOG";

fn filter(config: &Config) -> Result<EnvFilter> {
    let directives = std::env::var(LOG_ENV)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| config.log_level.clone());
    EnvFilter::try_new(&directives).with_context(|| format!("Invalid log filter '{directives}'"))
}

/// Installs the global subscriber. A second call is a no-op.
///
/// # Errors
/// Returns an error if the filter is invalid or the log directory cannot
/// be created.
pub fn init(config: &Config, verbose: bool) -> Result<()> {
    let filter = filter(config)?;
    let dir = paths::logs_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("libradmin")
        .filename_suffix("log")
        .build(&dir)
        .context("Failed to create log file appender")?;

    let stderr = verbose.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
    });

    // Ignore "already set": tests and embedders may have installed one.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(file_appender)
                .with_target(true)
                .with_ansi(false),
        )
        .with(stderr)
        .try_init();
    Ok(())
}
