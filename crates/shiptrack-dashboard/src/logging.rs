//! Tracing subscriber setup.

use shiptrack_data::{LogFormat, LoggingConfig};
use tracing_subscriber::{EnvFilter, fmt};

use crate::error::DashboardError;

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
///
/// Fails if a global subscriber is already set.
pub fn init(config: &LoggingConfig) -> Result<(), DashboardError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| DashboardError::Logging(e.to_string()))?;

    let result = match config.format {
        LogFormat::Json => fmt().json().with_env_filter(filter).try_init(),
        LogFormat::Pretty => fmt().with_env_filter(filter).with_target(true).try_init(),
    };
    result.map_err(|e| DashboardError::Logging(e.to_string()))
}

/// Debug-level subscriber writing through the test harness. Safe to call
/// from every test.
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_test_is_repeatable() {
        init_test();
        init_test();
        tracing::debug!("logging initialised twice without panicking");
    }

    #[test]
    fn invalid_level_is_reported() {
        // Only meaningful when RUST_LOG is unset.
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let config = LoggingConfig {
            level: "shiptrack=[".into(),
            ..LoggingConfig::default()
        };
        assert!(matches!(init(&config), Err(DashboardError::Logging(_))));
    }
}
