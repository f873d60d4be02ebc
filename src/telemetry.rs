//! Tracing subscriber setup.
//!
//! `RUST_LOG` wins over the configured level when set. `LOG_FORMAT` picks
//! JSON lines (default) or human-readable pretty output.

use anyhow::{Error, Result, anyhow};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the global subscriber. Call once, before anything logs.
pub fn init_tracing(log_level: &str, log_format: &str) -> Result<(), Error> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    match log_format {
        "json" => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .map_err(|e| anyhow!("Failed to initialize JSON tracing subscriber: {}", e)),
        "pretty" => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init()
            .map_err(|e| anyhow!("Failed to initialize pretty tracing subscriber: {}", e)),
        other => Err(anyhow!(
            "Unknown log format '{}', expected 'json' or 'pretty'",
            other
        )),
    }
}
