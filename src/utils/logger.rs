use std::sync::Once;

use tracing_subscriber::EnvFilter;

use crate::config::{BridgeConfig, LOG_ENV};

/// Installs the global `tracing` subscriber, filtered by `CQLBRIDGE_LOG`.
///
/// Safe to call repeatedly; only the first call has an effect. A subscriber
/// installed by the host application takes precedence.
pub fn init_logging() {
    init_logging_with(&BridgeConfig::from_env());
}

pub fn init_logging_with(config: &BridgeConfig) {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_new(&config.log_filter).unwrap_or_else(|err| {
            eprintln!("ignoring invalid {LOG_ENV} filter `{}`: {err}", config.log_filter);
            EnvFilter::new("warn")
        });
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init();
    });
}
