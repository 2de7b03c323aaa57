// packages/recorder/src/observability.rs
//! Diagnostics setup
//!
//! The SDK only emits `tracing` events and `metrics` counters. Hosts that
//! have no subscriber of their own can install one here.

use crate::utils::config::SdkConfig;
use crate::utils::errors::{Result, SdkError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when `RUST_LOG` is unset
pub fn default_directive(config: &SdkConfig) -> String {
    let level = if config.enable_logging { "debug" } else { "warn" };
    format!("{}={}", env!("CARGO_CRATE_NAME"), level)
}

/// Install a global subscriber; fails if one is already installed
pub fn init_tracing(config: &SdkConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(config)));

    let json = config
        .log_json
        .then(|| tracing_subscriber::fmt::layer().json());
    let plain = (!config.log_json).then(tracing_subscriber::fmt::layer);

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(plain)
        .try_init()
        .map_err(|e| SdkError::ConfigError(format!("Failed to initialize tracing: {}", e)))?;

    tracing::info!("TestChimp recorder v{} logging initialized", crate::VERSION);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        let mut config = SdkConfig::default();
        assert_eq!(default_directive(&config), "testchimp_recorder=debug");

        config.enable_logging = false;
        assert_eq!(default_directive(&config), "testchimp_recorder=warn");
    }

    #[test]
    fn test_second_init_fails() {
        let config = SdkConfig::default();
        let _ = init_tracing(&config);
        assert!(init_tracing(&config).is_err());
    }
}
