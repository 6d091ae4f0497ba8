//! Server configuration

use super::env_parse;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::env;

/// Listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerConfig {
    /// Listening address
    /// Env: PX_HOST
    /// Default: "0.0.0.0"
    pub host: String,

    /// Listening port
    /// Env: PX_PORT
    /// Default: 3000
    pub port: u16,

    /// Honour X-Forwarded-For / X-Real-IP when identifying clients
    /// Env: PX_TRUST_PROXY
    /// Default: true
    pub trust_proxy: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 3000, trust_proxy: true }
    }
}

impl ServerConfig {
    /// Socket address string suitable for `TcpListener::bind`
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Apply environment variables
    pub fn apply_env_vars(&mut self) {
        if let Ok(host) = env::var("PX_HOST") {
            self.host = host;
        }
        if let Some(port) = env_parse("PX_PORT") {
            self.port = port;
        }
        if let Some(trust) = env_parse("PX_TRUST_PROXY") {
            self.trust_proxy = trust;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            bail!("Invalid port: port must be between 1 and 65535");
        }
        if self.host.is_empty() {
            bail!("Invalid host: host cannot be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let cfg = ServerConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.bind_address(), "0.0.0.0:3000");
    }

    #[test]
    fn test_zero_port_fails() {
        let cfg = ServerConfig { port: 0, ..Default::default() };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("Invalid port"));
    }

    #[test]
    fn test_empty_host_fails() {
        let cfg = ServerConfig { host: String::new(), ..Default::default() };
        assert!(cfg.validate().is_err());
    }
}
