//! Upstream fetch configuration

use super::env_parse;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// How the proxy talks to upstream servers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProxyConfig {
    /// Per-attempt timeout in milliseconds
    /// Env: PX_PROXY_TIMEOUT
    /// Default: 30000
    pub timeout: u64,

    /// Total fetch attempts, first one included
    /// Env: PX_PROXY_MAX_ATTEMPTS
    /// Default: 3
    pub max_attempts: u32,

    /// Base delay in milliseconds; attempt `n` waits `base * 2^n`
    /// Default: 1000
    pub retry_backoff_ms: u64,

    /// Redirects followed before the 3xx is handed back
    /// Env: PX_PROXY_MAX_REDIRECTS
    /// Default: 5
    pub max_redirects: usize,

    /// Largest accepted client request body in bytes
    /// Env: PX_MAX_REQUEST_SIZE
    /// Default: 10485760 (10MB)
    pub max_request_size: usize,

    /// Largest upstream response body buffered, in bytes
    /// Env: PX_MAX_RESPONSE_SIZE
    /// Default: 52428800 (50MB)
    pub max_response_size: usize,

    /// User-Agent sent upstream
    /// Env: PX_USER_AGENT
    pub user_agent: String,

    /// Accept-Language sent upstream
    pub accept_language: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            timeout: 30_000,
            max_attempts: 3,
            retry_backoff_ms: 1000,
            max_redirects: 5,
            max_request_size: 10 * 1024 * 1024,
            max_response_size: 50 * 1024 * 1024,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept_language: "en-US,en;q=0.9".to_string(),
        }
    }
}

impl ProxyConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Apply environment variables
    pub fn apply_env_vars(&mut self) {
        if let Some(timeout) = env_parse("PX_PROXY_TIMEOUT") {
            self.timeout = timeout;
        }
        if let Some(attempts) = env_parse("PX_PROXY_MAX_ATTEMPTS") {
            self.max_attempts = attempts;
        }
        if let Some(redirects) = env_parse("PX_PROXY_MAX_REDIRECTS") {
            self.max_redirects = redirects;
        }
        if let Some(size) = env_parse("PX_MAX_REQUEST_SIZE") {
            self.max_request_size = size;
        }
        if let Some(size) = env_parse("PX_MAX_RESPONSE_SIZE") {
            self.max_response_size = size;
        }
        if let Ok(agent) = env::var("PX_USER_AGENT") {
            self.user_agent = agent;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.timeout == 0 {
            bail!("Invalid proxy.timeout: must be greater than 0");
        }
        if self.max_attempts == 0 {
            bail!("Invalid proxy.maxAttempts: at least one attempt is required");
        }
        if self.max_request_size == 0 {
            bail!("Invalid proxy.maxRequestSize: must be greater than 0");
        }
        if self.max_response_size == 0 {
            bail!("Invalid proxy.maxResponseSize: must be greater than 0");
        }
        if self.user_agent.trim().is_empty() {
            bail!("Invalid proxy.userAgent: cannot be empty");
        }
        Ok(())
    }
}
