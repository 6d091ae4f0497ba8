//! Logging configuration

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoggingConfig {
    /// Default filter, overridden by RUST_LOG
    /// Env: PX_LOG_LEVEL
    pub level: String,

    /// Strip credentials and secret query parameters from logged URLs
    pub sanitize_urls: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), sanitize_urls: true }
    }
}

impl LoggingConfig {
    pub fn apply_env_vars(&mut self) {
        if let Ok(level) = env::var("PX_LOG_LEVEL") {
            self.level = level;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.level.parse::<log::LevelFilter>().is_err() {
            bail!("Invalid logging.level '{}': expected off, error, warn, info, debug or trace", self.level);
        }
        Ok(())
    }
}
