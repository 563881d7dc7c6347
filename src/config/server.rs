//! Server configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use super::parse::{env_bool, env_duration, env_opt, env_or, env_parse, env_parse_opt};
use super::ConfigError;

/// Server configuration loaded from environment.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Listen address (default: 0.0.0.0:8080).
    pub listen_addr: SocketAddr,
    /// Document root directory (default: /var/www/html).
    pub document_root: PathBuf,
    /// File served for directory requests (default: index.html).
    pub index_file: String,
    /// Server name reported to handlers. Falls back to the request's
    /// `Host` header, then to the listen IP.
    pub server_name: Option<String>,
    /// Internal server address for /health and /metrics.
    pub internal_addr: Option<SocketAddr>,
    /// Emit one structured log line per request.
    pub access_log: bool,
    /// Graceful shutdown drain timeout.
    pub drain_timeout: Duration,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let listen_addr: SocketAddr = env_parse("LISTEN_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080)))?;
        let internal_addr = env_parse_opt("INTERNAL_ADDR")?;

        let index_file = env_or("INDEX_FILE", "index.html");
        if index_file.is_empty() || index_file.contains('/') {
            return Err(ConfigError::Invalid {
                key: "INDEX_FILE".into(),
                message: format!("expected a plain file name, got '{}'", index_file),
            });
        }

        Ok(Self {
            listen_addr,
            document_root: PathBuf::from(env_or("DOCUMENT_ROOT", "/var/www/html")),
            index_file,
            server_name: env_opt("SERVER_NAME"),
            internal_addr,
            access_log: env_bool("ACCESS_LOG", false),
            drain_timeout: env_duration("DRAIN_TIMEOUT", "30s")?,
        })
    }
}
