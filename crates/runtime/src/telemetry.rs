//! Logging setup
//!
//! `RUST_LOG` wins over the configured filter; `AUTOCODER_LOG_FORMAT`
//! (`pretty` | `json`) wins over the configured format.

use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::settings::{LogFormat, LoggingSettings};

pub const LOG_FORMAT_ENV: &str = "AUTOCODER_LOG_FORMAT";

/// Effective format after the env override
pub fn resolve_format(settings: &LoggingSettings) -> Result<LogFormat> {
    match std::env::var(LOG_FORMAT_ENV) {
        Ok(raw) => raw.parse(),
        Err(_) => Ok(settings.format),
    }
}

/// Install the global subscriber
///
/// Returns `false` if a subscriber was already installed (embedding hosts
/// and tests), which is not an error.
pub fn init_logging(settings: &LoggingSettings) -> Result<bool> {
    let format = resolve_format(settings)?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.filter))?;

    let installed = match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .try_init()
            .is_ok(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty())
            .try_init()
            .is_ok(),
    };

    if installed {
        tracing::debug!(format = ?format, filter = %settings.filter, "Logging initialized");
    }
    Ok(installed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_not_an_error() {
        let settings = LoggingSettings::default();
        let _ = init_logging(&settings).unwrap();
        assert!(!init_logging(&settings).unwrap());
    }

    #[test]
    fn test_invalid_filter_rejected() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let settings = LoggingSettings {
            filter: "autocoder=loudest".to_string(),
            ..LoggingSettings::default()
        };
        assert!(init_logging(&settings).is_err());
    }
}
