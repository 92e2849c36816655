//! Tracing subscriber setup.
//!
//! The library crates only emit `tracing` events. The simulator calls
//! [`init_tracing`] once at startup to decide where they go.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use feedline_core::{ConfigError, FeedResult};

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Telemetry configuration from environment variables.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// `EnvFilter` directive, e.g. `"info,feedline_storage=debug"`.
    pub filter: String,
    pub format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            filter: std::env::var("FEEDLINE_LOG").unwrap_or_else(|_| "info".to_string()),
            format: match std::env::var("FEEDLINE_LOG_FORMAT").as_deref() {
                Ok("json") => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        }
    }
}

/// Install the global tracing subscriber.
///
/// Fails if the filter directive does not parse or a subscriber is already
/// installed.
pub fn init_tracing(config: &TelemetryConfig) -> FeedResult<()> {
    let filter = EnvFilter::try_new(&config.filter).map_err(|e| ConfigError::InvalidValue {
        field: "FEEDLINE_LOG".to_string(),
        value: config.filter.clone(),
        reason: e.to_string(),
    })?;

    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    };

    result.map_err(|e| {
        ConfigError::InvalidValue {
            field: "tracing subscriber".to_string(),
            value: format!("{:?}", config.format),
            reason: e.to_string(),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_filter_is_config_error() {
        let config = TelemetryConfig {
            filter: "feedline=notalevel[".to_string(),
            format: LogFormat::Pretty,
        };
        let err = init_tracing(&config).unwrap_err();
        assert!(matches!(err, feedline_core::FeedError::Config(_)));
    }
}
