//! Configuration system for Passage
//!
//! Values are resolved in the following order (highest priority wins):
//!
//! 1. **Environment Variables** (`PX_*`)
//! 2. **Config File** (`passage.toml`)
//! 3. **Defaults**
//!
//! # Example
//!
//! ```no_run
//! use passage_core::config::PassageConfig;
//!
//! let config = PassageConfig::load_from("passage.toml")?;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod cache;
pub mod features;
pub mod logging;
pub mod proxy;
pub mod rate_limit;
pub mod server;

pub use cache::CacheConfig;
pub use features::{AdblockConfig, BlocklistConfig, CaptchaConfig, UrlEncodingConfig};
pub use logging::LoggingConfig;
pub use proxy::ProxyConfig;
pub use rate_limit::RateLimitConfig;
pub use server::ServerConfig;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Complete Passage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PassageConfig {
    pub server: ServerConfig,
    pub proxy: ProxyConfig,
    pub cache: CacheConfig,
    pub rate_limit: RateLimitConfig,
    pub adblock: AdblockConfig,
    pub blocklist: BlocklistConfig,
    pub url_encoding: UrlEncodingConfig,
    pub captcha: CaptchaConfig,
    pub logging: LoggingConfig,
}

impl PassageConfig {
    /// Load `passage.toml` from the working directory, then the environment
    pub fn load() -> Result<Self> {
        Self::load_from("passage.toml")
    }

    /// Defaults, then the file if it exists, then environment variables
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let mut config = if path.exists() {
            Self::from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?
        } else {
            log::debug!("No config file at {}, using defaults", path.display());
            Self::default()
        };

        config.apply_env_vars();
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a TOML file. Missing keys keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.as_ref().display()))
    }

    /// Apply environment variables to configuration
    pub fn apply_env_vars(&mut self) {
        self.server.apply_env_vars();
        self.proxy.apply_env_vars();
        self.cache.apply_env_vars();
        self.rate_limit.apply_env_vars();
        self.adblock.apply_env_vars();
        self.blocklist.apply_env_vars();
        self.url_encoding.apply_env_vars();
        self.captcha.apply_env_vars();
        self.logging.apply_env_vars();
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;
        self.proxy.validate()?;
        self.cache.validate()?;
        self.rate_limit.validate()?;
        self.url_encoding.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

/// Parse an environment variable, ignoring it when absent or malformed
pub(crate) fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("⚠️ Ignoring {}: cannot parse '{}'", name, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::EncodingScheme;

    #[test]
    fn test_default_config() {
        let config = PassageConfig::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.proxy.timeout, 30_000);
        assert_eq!(config.proxy.max_attempts, 3);
        assert_eq!(config.cache.ttl, 3600);
        assert_eq!(config.cache.max_size, 100);
        assert_eq!(config.rate_limit.window_ms, 60_000);
        assert_eq!(config.rate_limit.max_requests, 100);
        assert_eq!(config.url_encoding.scheme, EncodingScheme::Base64);
        assert!(config.adblock.enabled);
        assert!(!config.captcha.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("passage.toml");
        std::fs::write(
            &path,
            r#"
[cache]
ttl = 60
maxSize = 5

[rateLimit]
windowMs = 1000

[urlEncoding]
scheme = "xor"
key = "secret"
"#,
        )
        .unwrap();

        let config = PassageConfig::from_file(&path).unwrap();
        assert_eq!(config.cache.ttl, 60);
        assert_eq!(config.cache.max_size, 5);
        assert!(config.cache.enabled);
        assert_eq!(config.rate_limit.window_ms, 1000);
        assert_eq!(config.rate_limit.max_requests, 100);
        assert_eq!(config.url_encoding.scheme, EncodingScheme::XorHex);
        assert_eq!(config.url_encoding.key.as_deref(), Some("secret"));
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("passage.toml");
        std::fs::write(&path, "[cache\nttl = ").unwrap();

        let err = PassageConfig::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse TOML config"));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = PassageConfig::load_from(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.proxy.max_redirects, 5);
    }

    #[test]
    fn test_validation_rejects_zero_limits() {
        let mut config = PassageConfig::default();
        config.rate_limit.max_requests = 0;
        assert!(config.validate().is_err());

        let mut config = PassageConfig::default();
        config.cache.max_size = 0;
        assert!(config.validate().is_err());

        let mut config = PassageConfig::default();
        config.logging.level = "chatty".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_apply_env_vars() {
        let mut config = PassageConfig::default();
        std::env::set_var("PX_CACHE_MAX_SIZE", "42");
        std::env::set_var("PX_RATE_WINDOW_MS", "not-a-number");
        config.apply_env_vars();
        assert_eq!(config.cache.max_size, 42);
        assert_eq!(config.rate_limit.window_ms, 60_000);
        std::env::remove_var("PX_CACHE_MAX_SIZE");
        std::env::remove_var("PX_RATE_WINDOW_MS");
    }
}
