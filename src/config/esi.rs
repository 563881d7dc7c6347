//! ESI processor configuration.

use super::parse::env_parse;
use super::ConfigError;
use crate::esi::DEFAULT_MAX_DEPTH;

/// ESI processing configuration loaded from environment.
#[derive(Clone, Debug)]
pub struct EsiConfig {
    /// Maximum include nesting depth (default: 5).
    pub max_depth: usize,
}

impl EsiConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            max_depth: env_parse("ESI_MAX_DEPTH", DEFAULT_MAX_DEPTH)?,
        })
    }
}

impl Default for EsiConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}
