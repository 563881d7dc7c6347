//! Configuration module for tokio_esi.
//!
//! This module provides centralized configuration loading from environment variables.
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `LISTEN_ADDR` | `0.0.0.0:8080` | Public listen address |
//! | `DOCUMENT_ROOT` | `/var/www/html` | Static handler root |
//! | `INDEX_FILE` | `index.html` | File served for directories |
//! | `SERVER_NAME` | - | Server name for same-origin include checks |
//! | `INTERNAL_ADDR` | - | `/health` and `/metrics` listener |
//! | `ACCESS_LOG` | `false` | Per-request access log |
//! | `DRAIN_TIMEOUT` | `30s` | Graceful shutdown drain timeout |
//! | `ESI_MAX_DEPTH` | `5` | Include nesting limit |
//! | `LOG_LEVEL` / `RUST_LOG` | `tokio_esi=info` | Log filter |
//! | `LOG_FORMAT` | `text` | `text` or `json` |
//! | `SERVICE_NAME` | `tokio_esi` | Service name in JSON logs |
//!
//! # Example
//!
//! ```rust,ignore
//! use tokio_esi::config::Config;
//!
//! let config = Config::from_env()?;
//! println!("Listen address: {}", config.server.listen_addr);
//! println!("Max include depth: {}", config.esi.max_depth);
//! ```

mod error;
mod esi;
mod logging;
mod parse;
mod server;

pub use error::ConfigError;
pub use esi::EsiConfig;
pub use logging::{LogFormat, LoggingConfig};
pub use server::ServerConfig;

/// Complete application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// ESI processor configuration.
    pub esi: EsiConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            server: ServerConfig::from_env()?,
            esi: EsiConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
        })
    }

    /// Print configuration summary to log.
    pub fn log_summary(&self) {
        use tracing::info;

        info!("Configuration loaded:");
        info!("  Listen: {}", self.server.listen_addr);
        info!("  Document root: {:?}", self.server.document_root);
        info!("  Index file: {}", self.server.index_file);
        info!("  ESI max depth: {}", self.esi.max_depth);

        if let Some(ref name) = self.server.server_name {
            info!("  Server name: {}", name);
        }

        if let Some(ref internal) = self.server.internal_addr {
            info!("  Internal server: {}", internal);
        }

        if self.server.access_log {
            info!("  Access log: enabled");
        }
    }
}
