//! Logging configuration.

use std::str::FromStr;

use super::parse::{env_or, env_parse};
use super::ConfigError;

/// Log line format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable `tracing-subscriber` output.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("expected text or json, got '{}'", other)),
        }
    }
}

/// Logging configuration loaded from environment.
#[derive(Clone, Debug)]
pub struct LoggingConfig {
    /// Log level filter (from LOG_LEVEL or RUST_LOG).
    pub filter: String,
    /// Output format (LOG_FORMAT).
    pub format: LogFormat,
    /// Service name for structured logging.
    pub service_name: String,
}

impl LoggingConfig {
    /// Load configuration from environment variables.
    ///
    /// Priority: LOG_LEVEL > RUST_LOG > default
    ///
    /// LOG_LEVEL accepts simple values: trace, debug, info, warn, error
    /// RUST_LOG accepts full tracing filter syntax: tokio_esi=debug,hyper=warn
    pub fn from_env() -> Result<Self, ConfigError> {
        let filter = Self::resolve_log_filter();
        Ok(Self {
            filter,
            format: env_parse("LOG_FORMAT", LogFormat::Text)?,
            service_name: env_or("SERVICE_NAME", "tokio_esi"),
        })
    }

    /// Resolve log filter from environment.
    ///
    /// Priority: LOG_LEVEL > RUST_LOG > default (info)
    fn resolve_log_filter() -> String {
        // 1. Check LOG_LEVEL first (simple: debug, info, warn, error)
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            let level = level.to_lowercase();
            match level.as_str() {
                "trace" | "debug" | "info" | "warn" | "error" => {
                    return format!("tokio_esi={}", level);
                }
                _ => {
                    // Logging is not up yet.
                    eprintln!(
                        "Warning: Invalid LOG_LEVEL '{}', expected: trace, debug, info, warn, error",
                        level
                    );
                }
            }
        }

        // 2. Check RUST_LOG (full tracing filter syntax)
        if let Ok(filter) = std::env::var("RUST_LOG") {
            return filter;
        }

        // 3. Default
        "tokio_esi=info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "tokio_esi=info".to_string(),
            format: LogFormat::Text,
            service_name: "tokio_esi".to_string(),
        }
    }
}
