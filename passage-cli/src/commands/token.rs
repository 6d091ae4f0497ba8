//! `passage encode` / `passage decode`

use anyhow::{bail, Context, Result};
use passage_core::config::PassageConfig;
use passage_core::codec::is_valid_target;
use passage_core::{EncodingScheme, UrlCodec};
use std::path::Path;

/// Codec sharing the server's key. Keyed schemes refuse a random key.
fn codec(config: &PassageConfig, scheme: EncodingScheme) -> Result<UrlCodec> {
    match config.url_encoding.key.as_deref() {
        Some(key) => UrlCodec::new(scheme, key.as_bytes()).context("Invalid urlEncoding.key"),
        None if scheme == EncodingScheme::Base64 => Ok(UrlCodec::with_random_key(scheme)),
        None => bail!("The {} scheme needs urlEncoding.key (or PX_URL_KEY) to match the server", scheme),
    }
}

pub fn encode(config_path: &Path, url: &str, scheme: Option<EncodingScheme>) -> Result<String> {
    let config = PassageConfig::load_from(config_path)?;
    encode_with(&config, url, scheme)
}

pub fn decode(config_path: &Path, token: &str) -> Result<String> {
    let config = PassageConfig::load_from(config_path)?;
    decode_with(&config, token)
}

fn encode_with(config: &PassageConfig, url: &str, scheme: Option<EncodingScheme>) -> Result<String> {
    if !is_valid_target(url) {
        bail!("'{}' is not an absolute http or https URL", url);
    }
    let scheme = scheme.unwrap_or(config.url_encoding.scheme);
    Ok(codec(config, scheme)?.encode(url))
}

fn decode_with(config: &PassageConfig, token: &str) -> Result<String> {
    // Keyed tokens only decode with the configured key; base64 needs none
    let codec = match config.url_encoding.key.as_deref() {
        Some(_) => codec(config, config.url_encoding.scheme)?,
        None => UrlCodec::with_random_key(EncodingScheme::Base64),
    };
    codec.decode(token).context("Token does not decode to an http or https URL")
}
