//! Tracing subscriber setup
//!
//! Filter precedence: `ROSTER_LOG`, then the configured `log_level`, then
//! `roster=info` (`roster=debug` when verbose). Events go to stderr so they
//! never mix with command output; a plain-text copy goes to `log_file` when
//! one is configured.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::core::config::LOG_ENV;

/// Build the filter directive string for the given settings
pub fn filter_directive(configured: Option<&str>, verbose: bool) -> String {
    if let Ok(env) = std::env::var(LOG_ENV) {
        if !env.trim().is_empty() {
            return env;
        }
    }
    match configured {
        Some(level) if !level.trim().is_empty() => level.to_string(),
        _ if verbose => "roster=debug".to_string(),
        _ => "roster=info".to_string(),
    }
}

/// Install the global subscriber; later calls are ignored
pub fn init(configured: Option<&str>, log_file: Option<&Path>, verbose: bool, quiet: bool) {
    let directive = if quiet {
        "roster=error".to_string()
    } else {
        filter_directive(configured, verbose)
    };
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("roster=info"));

    let file_layer = log_file.and_then(|path| {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .ok()
            .map(|file| fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
    });

    let stderr_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init();
}

/// Route events to the test harness output
#[cfg(test)]
pub(crate) fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("roster=debug"))
        .with_test_writer()
        .try_init();
}
