//! Rate limiter configuration

use super::env_parse;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One day
pub const MAX_WINDOW_MS: u64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RateLimitConfig {
    /// Env: PX_RATE_LIMIT_ENABLED
    pub enabled: bool,

    /// Sliding window length in milliseconds
    /// Env: PX_RATE_WINDOW_MS
    /// Default: 60000
    pub window_ms: u64,

    /// Requests admitted per client inside one window
    /// Env: PX_RATE_MAX_REQUESTS
    /// Default: 100
    pub max_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { enabled: true, window_ms: 60_000, max_requests: 100 }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn apply_env_vars(&mut self) {
        if let Some(enabled) = env_parse("PX_RATE_LIMIT_ENABLED") {
            self.enabled = enabled;
        }
        if let Some(window) = env_parse("PX_RATE_WINDOW_MS") {
            self.window_ms = window;
        }
        if let Some(max) = env_parse("PX_RATE_MAX_REQUESTS") {
            self.max_requests = max;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.window_ms == 0 || self.window_ms > MAX_WINDOW_MS {
            bail!("Invalid rateLimit.windowMs: must be between 1 and {}", MAX_WINDOW_MS);
        }
        if self.max_requests == 0 {
            bail!("Invalid rateLimit.maxRequests: must be greater than 0");
        }
        Ok(())
    }
}
