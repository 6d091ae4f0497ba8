//! Feature toggles: ad blocking, blocklist persistence, URL tokens, challenges

use super::env_parse;
use crate::codec::EncodingScheme;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AdblockConfig {
    /// Env: PX_ADBLOCK_ENABLED
    pub enabled: bool,
}

impl Default for AdblockConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl AdblockConfig {
    pub fn apply_env_vars(&mut self) {
        if let Some(enabled) = env_parse("PX_ADBLOCK_ENABLED") {
            self.enabled = enabled;
        }
    }
}

/// Durable storage of the custom blocklist
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BlocklistConfig {
    /// JSON file holding custom entries; in-memory only when unset
    /// Env: PX_BLOCKLIST_PATH
    pub path: Option<PathBuf>,
}

impl BlocklistConfig {
    pub fn apply_env_vars(&mut self) {
        if let Ok(path) = env::var("PX_BLOCKLIST_PATH") {
            self.path = Some(PathBuf::from(path));
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UrlEncodingConfig {
    /// Scheme used when the proxy mints tokens (Location rewrites, CLI)
    /// Env: PX_URL_SCHEME
    pub scheme: EncodingScheme,

    /// Shared secret for the XOR and AES schemes. A random key is drawn
    /// per process when unset, so tokens do not survive a restart.
    /// Env: PX_URL_KEY
    pub key: Option<String>,
}

impl UrlEncodingConfig {
    pub fn apply_env_vars(&mut self) {
        if let Ok(scheme) = env::var("PX_URL_SCHEME") {
            match scheme.parse() {
                Ok(parsed) => self.scheme = parsed,
                Err(e) => log::warn!("⚠️ Ignoring PX_URL_SCHEME: {}", e),
            }
        }
        if let Ok(key) = env::var("PX_URL_KEY") {
            self.key = Some(key);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if matches!(self.key.as_deref(), Some("")) {
            bail!("Invalid urlEncoding.key: cannot be empty");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CaptchaConfig {
    /// Let a challenge solver retry the fetch once
    /// Env: PX_CAPTCHA_ENABLED
    pub enabled: bool,
}

impl CaptchaConfig {
    pub fn apply_env_vars(&mut self) {
        if let Some(enabled) = env_parse("PX_CAPTCHA_ENABLED") {
            self.enabled = enabled;
        }
    }
}
