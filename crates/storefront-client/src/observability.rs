//! Tracing setup with a filter that can be swapped after start-up.
//!
//! Output goes to stderr so command output on stdout stays parseable.
use std::sync::OnceLock;
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

use crate::config::LoggingConfig;

static FILTER_HANDLE: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

/// Installs the global subscriber. A valid `RUST_LOG` takes precedence over
/// `level`. Later calls leave the first subscriber in place.
pub fn init_tracing_with_level(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let (filter, handle) = reload::Layer::new(filter);
    if FILTER_HANDLE.set(handle).is_err() {
        return;
    }

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init();
}

pub fn init_tracing_from_config(logging: &LoggingConfig) {
    init_tracing_with_level(&logging.level);
}

/// Replaces the active filter with `directives` (a level or any `EnvFilter`
/// expression). False when tracing was not installed by this module or the
/// directives do not parse.
pub fn apply_logging_level(directives: &str) -> bool {
    let Ok(filter) = EnvFilter::try_new(directives) else {
        return false;
    };
    FILTER_HANDLE
        .get()
        .is_some_and(|handle| handle.reload(filter).is_ok())
}
