//! Response cache configuration

use super::env_parse;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One year
pub const MAX_TTL_SECS: u64 = 365 * 24 * 60 * 60;
/// One day
pub const MAX_SWEEP_INTERVAL_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheConfig {
    /// Env: PX_CACHE_ENABLED
    pub enabled: bool,

    /// Entry lifetime in seconds
    /// Env: PX_CACHE_TTL
    /// Default: 3600
    pub ttl: u64,

    /// Capacity in entries, not bytes
    /// Env: PX_CACHE_MAX_SIZE
    /// Default: 100
    pub max_size: usize,

    /// Seconds between background expiry sweeps
    /// Default: 60
    pub sweep_interval: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { enabled: true, ttl: 3600, max_size: 100, sweep_interval: 60 }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval.max(1))
    }

    pub fn apply_env_vars(&mut self) {
        if let Some(enabled) = env_parse("PX_CACHE_ENABLED") {
            self.enabled = enabled;
        }
        if let Some(ttl) = env_parse("PX_CACHE_TTL") {
            self.ttl = ttl;
        }
        if let Some(size) = env_parse("PX_CACHE_MAX_SIZE") {
            self.max_size = size;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            bail!("Invalid cache.maxSize: must hold at least one entry");
        }
        if self.ttl == 0 || self.ttl > MAX_TTL_SECS {
            bail!("Invalid cache.ttl: must be between 1 and {} seconds", MAX_TTL_SECS);
        }
        if self.sweep_interval == 0 || self.sweep_interval > MAX_SWEEP_INTERVAL_SECS {
            bail!("Invalid cache.sweepInterval: must be between 1 and {} seconds", MAX_SWEEP_INTERVAL_SECS);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_bounds() {
        let mut config = CacheConfig::default();
        assert!(config.validate().is_ok());

        config.ttl = u64::MAX;
        assert!(config.validate().is_err());

        config.ttl = MAX_TTL_SECS;
        assert!(config.validate().is_ok());

        config.sweep_interval = u64::MAX;
        assert!(config.validate().is_err());
    }
}
