//! Logging initialization and configuration.
//!
//! The interactive console owns stdout, so log records go to stderr. That is
//! still the terminal the prompt is drawn on, so the default filter only lets
//! warnings through.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when none is configured.
pub const DEFAULT_FILTER: &str = "nvlv_console=warn";

fn filter_for(level: Option<&str>) -> EnvFilter {
    match level {
        Some(level) => EnvFilter::try_new(level).ok(),
        None => EnvFilter::try_from_default_env().ok(),
    }
    .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

fn subscriber(filter: EnvFilter) -> impl SubscriberInitExt {
    tracing_subscriber::registry().with(filter).with(
        tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .with_writer(std::io::stderr),
    )
}

/// Initialize the logging system.
///
/// Filters with `RUST_LOG`, or [`DEFAULT_FILTER`] when unset.
///
/// # Panics
///
/// Panics if a global subscriber is already installed.
pub fn init() {
    subscriber(filter_for(None)).init();
}

/// Like [`try_init`], with an explicit filter directive.
///
/// An unparsable directive falls back to the default filter.
pub fn try_init_with(level: &str) -> Result<(), tracing_subscriber::util::TryInitError> {
    subscriber(filter_for(Some(level))).try_init()
}

/// Initialize the logging system unless a subscriber is already installed.
pub fn try_init() -> Result<(), tracing_subscriber::util::TryInitError> {
    subscriber(filter_for(None)).try_init()
}
