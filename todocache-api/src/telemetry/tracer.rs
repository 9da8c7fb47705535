//! Tracing Subscriber Initialization
//!
//! Installs the global subscriber: an `EnvFilter` (from `RUST_LOG`, with a
//! crate-level default) plus a JSON or human-readable fmt layer.

use std::str::FromStr;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{ApiError, ApiResult};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "todocache_api=debug,todocache_distcache=info,tower_http=info,info";

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" | "text" => Ok(LogFormat::Pretty),
            other => Err(ApiError::invalid_input(format!(
                "Unknown log format '{}', expected json or pretty",
                other
            ))),
        }
    }
}

/// Telemetry configuration from environment variables.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to the startup log line
    pub service_name: String,
    pub log_format: LogFormat,
    /// Filter directives used when `RUST_LOG` is unset
    pub default_filter: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "todocache".to_string(),
            log_format: LogFormat::default(),
            default_filter: DEFAULT_FILTER.to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Read `TODOCACHE_SERVICE_NAME` and `TODOCACHE_LOG_FORMAT`.
    pub fn from_env() -> ApiResult<Self> {
        let defaults = Self::default();
        let log_format = match std::env::var("TODOCACHE_LOG_FORMAT") {
            Ok(value) => value.parse()?,
            Err(_) => defaults.log_format,
        };
        Ok(Self {
            service_name: std::env::var("TODOCACHE_SERVICE_NAME")
                .unwrap_or(defaults.service_name),
            log_format,
            default_filter: defaults.default_filter,
        })
    }
}

/// Install the global tracing subscriber.
///
/// Must be called once, before any listener starts.
pub fn init_tracing(config: &TelemetryConfig) -> ApiResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    let (json, pretty) = match config.log_format {
        LogFormat::Json => (Some(fmt::layer().json()), None),
        LogFormat::Pretty => (None, Some(fmt::layer())),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json)
        .with(pretty)
        .try_init()
        .map_err(|e| ApiError::internal_error(format!("Failed to init subscriber: {}", e)))?;

    tracing::info!(
        service_name = %config.service_name,
        log_format = ?config.log_format,
        "Telemetry initialized"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("json".parse::<LogFormat>().ok(), Some(LogFormat::Json));
        assert_eq!(" Pretty ".parse::<LogFormat>().ok(), Some(LogFormat::Pretty));
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_telemetry_config_default() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "todocache");
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(config.default_filter.starts_with("todocache_api=debug"));
    }
}
