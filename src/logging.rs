//! `tracing` subscriber setup for the `fias` binary.

use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;

/// Install a stderr formatter. `RUST_LOG` wins over `[log].filter`.
pub fn init(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
