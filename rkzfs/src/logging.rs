//! Tracing setup.
//!
//! stdout and stderr carry the result record, so setup problems cannot be
//! reported there.  An invalid `RKZFS_LOG` directive falls back to `info`
//! and is logged as a warning through the installed subscriber.  If no
//! subscriber can be installed at all (journald unreachable and the log file
//! not writable), the driver runs without logging.

use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing::warn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LogConfig;

const FALLBACK_FILTER: &str = "info";

/// Parse `directives`, falling back to [`FALLBACK_FILTER`].  The second value
/// is the parse error, if any.
fn build_filter(directives: &str) -> (EnvFilter, Option<String>) {
    match EnvFilter::try_new(directives) {
        Ok(filter) => (filter, None),
        Err(e) => (EnvFilter::new(FALLBACK_FILTER), Some(e.to_string())),
    }
}

/// Install the global subscriber if logging is enabled.
///
/// Events go to journald when it is reachable, otherwise to the configured
/// log file as JSON lines.  Never writes to stdout or stderr.
pub fn init(cfg: &LogConfig) -> Result<()> {
    let Some(directives) = cfg.filter.as_deref() else {
        return Ok(());
    };
    let (filter, filter_error) = build_filter(directives);
    let registry = tracing_subscriber::registry().with(filter);

    match tracing_journald::layer() {
        Ok(journald) => registry
            .with(journald.with_syslog_identifier("rkzfs".to_owned()))
            .try_init()
            .context("failed to install journald subscriber")?,
        Err(_) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&cfg.file)
                .with_context(|| format!("failed to open log file {}", cfg.file.display()))?;
            registry
                .with(fmt::layer().json().with_writer(Mutex::new(file)))
                .try_init()
                .context("failed to install file subscriber")?;
        }
    }

    if let Some(error) = filter_error {
        warn!(directives, %error, fallback = FALLBACK_FILTER, "invalid RKZFS_LOG filter");
    }
    Ok(())
}
