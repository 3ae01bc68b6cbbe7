//! Tracing subscriber setup

use crate::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Default filter for a configured level: our crate at `level`, the rest
/// at `warn`.
pub fn default_directive(config: &LoggingConfig) -> String {
    format!("warn,salad={}", config.level)
}

/// Install the global subscriber. `RUST_LOG` wins over the config. Safe to
/// call more than once; later calls are ignored.
pub fn init(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(config)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.with_target)
        .try_init();
}
