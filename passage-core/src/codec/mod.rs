//! URL tokens carried in `/proxy/{token}`
//!
//! A token is a path-safe rendition of the target URL. Three schemes are
//! minted (URL-safe base64, XOR with the shared key as hex, AES-256-GCM as
//! `hex(nonce):hex(ciphertext)`), and [`UrlCodec::decode`] sniffs them in a
//! fixed order: base64, XOR, AES, then the raw string. The first candidate
//! that parses as an absolute http/https URL wins.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use hkdf::Hkdf;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;
use std::str::FromStr;
use url::Url;

const KEY_INFO: &[u8] = b"passage-url-token-v1";
const NONCE_LEN: usize = 12;

/// Token schemes, tried in declaration order when decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EncodingScheme {
    #[default]
    #[serde(rename = "base64")]
    Base64,
    #[serde(rename = "xor", alias = "xor-hex")]
    XorHex,
    #[serde(rename = "aes", alias = "aes-gcm")]
    AesGcm,
}

impl EncodingScheme {
    pub const ALL: [EncodingScheme; 3] =
        [EncodingScheme::Base64, EncodingScheme::XorHex, EncodingScheme::AesGcm];

    pub fn as_str(&self) -> &'static str {
        match self {
            EncodingScheme::Base64 => "base64",
            EncodingScheme::XorHex => "xor",
            EncodingScheme::AesGcm => "aes",
        }
    }
}

impl fmt::Display for EncodingScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EncodingScheme {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "base64" => Ok(EncodingScheme::Base64),
            "xor" | "xor-hex" => Ok(EncodingScheme::XorHex),
            "aes" | "aes-gcm" => Ok(EncodingScheme::AesGcm),
            other => Err(CodecError::UnknownScheme(other.to_string())),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Unknown encoding scheme '{0}' (expected base64, xor or aes)")]
    UnknownScheme(String),
    #[error("Shared key cannot be empty")]
    EmptyKey,
}

/// Encodes and decodes target URLs with a process-wide shared key
pub struct UrlCodec {
    scheme: EncodingScheme,
    key: Vec<u8>,
    cipher: Aes256Gcm,
}

impl UrlCodec {
    /// Build a codec minting `scheme` tokens with the given shared secret
    pub fn new(scheme: EncodingScheme, secret: &[u8]) -> Result<Self, CodecError> {
        if secret.is_empty() {
            return Err(CodecError::EmptyKey);
        }

        let mut aes_key = [0u8; 32];
        Hkdf::<Sha256>::new(None, secret)
            .expand(KEY_INFO, &mut aes_key)
            .map_err(|_| CodecError::EmptyKey)?;

        Ok(Self {
            scheme,
            key: secret.to_vec(),
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&aes_key)),
        })
    }

    /// Codec with a fresh random key; its tokens die with the process
    pub fn with_random_key(scheme: EncodingScheme) -> Self {
        let mut secret = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut secret);
        let mut aes_key = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut aes_key);

        Self {
            scheme,
            key: secret.to_vec(),
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&aes_key)),
        }
    }

    /// Codec from configuration: configured key, or a random one
    pub fn from_config(config: &crate::config::UrlEncodingConfig) -> Result<Self, CodecError> {
        match config.key.as_deref() {
            Some(key) => Self::new(config.scheme, key.as_bytes()),
            None => {
                log::info!("🔑 No urlEncoding.key configured, using a per-process random key");
                Ok(Self::with_random_key(config.scheme))
            }
        }
    }

    pub fn scheme(&self) -> EncodingScheme {
        self.scheme
    }

    /// Encode with the configured scheme
    pub fn encode(&self, url: &str) -> String {
        self.encode_with(url, self.scheme)
    }

    /// Encode with an explicit scheme. Output only uses path-safe characters.
    pub fn encode_with(&self, url: &str, scheme: EncodingScheme) -> String {
        match scheme {
            EncodingScheme::Base64 => URL_SAFE_NO_PAD.encode(url.as_bytes()),
            EncodingScheme::XorHex => hex::encode(self.xor(url.as_bytes())),
            EncodingScheme::AesGcm => {
                let mut nonce = [0u8; NONCE_LEN];
                rand::thread_rng().fill_bytes(&mut nonce);
                match self.cipher.encrypt(Nonce::from_slice(&nonce), url.as_bytes()) {
                    Ok(ciphertext) => format!("{}:{}", hex::encode(nonce), hex::encode(ciphertext)),
                    Err(_) => {
                        log::warn!("⚠️ AES token encryption failed, falling back to base64");
                        URL_SAFE_NO_PAD.encode(url.as_bytes())
                    }
                }
            }
        }
    }

    /// Decode a token into the exact URL it was minted from.
    ///
    /// Returns `None` when no scheme yields an absolute http/https URL.
    pub fn decode(&self, token: &str) -> Option<String> {
        let token = token.trim();
        if token.is_empty() {
            return None;
        }

        self.decode_candidate(token).or_else(|| {
            // Browsers and routers may percent-encode the token on the way in
            let unescaped = urlencoding::decode(token).ok()?;
            if unescaped == token {
                return None;
            }
            self.decode_candidate(&unescaped)
        })
    }

    fn decode_candidate(&self, token: &str) -> Option<String> {
        EncodingScheme::ALL
            .iter()
            .find_map(|scheme| self.try_decode(token, *scheme))
            .or_else(|| is_valid_target(token).then(|| token.to_string()))
    }

    fn try_decode(&self, token: &str, scheme: EncodingScheme) -> Option<String> {
        let bytes = match scheme {
            EncodingScheme::Base64 => decode_base64(token)?,
            EncodingScheme::XorHex => self.xor(&hex::decode(token).ok()?),
            EncodingScheme::AesGcm => {
                let (nonce, ciphertext) = token.split_once(':')?;
                let nonce = hex::decode(nonce).ok()?;
                if nonce.len() != NONCE_LEN {
                    return None;
                }
                let ciphertext = hex::decode(ciphertext).ok()?;
                self.cipher.decrypt(Nonce::from_slice(&nonce), ciphertext.as_ref()).ok()?
            }
        };

        let candidate = String::from_utf8(bytes).ok()?;
        is_valid_target(&candidate).then_some(candidate)
    }

    fn xor(&self, data: &[u8]) -> Vec<u8> {
        data.iter().zip(self.key.iter().cycle()).map(|(byte, key)| byte ^ key).collect()
    }
}

impl fmt::Debug for UrlCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UrlCodec").field("scheme", &self.scheme).finish_non_exhaustive()
    }
}

fn decode_base64(token: &str) -> Option<Vec<u8>> {
    [&URL_SAFE_NO_PAD, &URL_SAFE, &STANDARD, &STANDARD_NO_PAD]
        .iter()
        .find_map(|engine| engine.decode(token).ok())
}

/// Absolute URL with an http or https scheme and a host
pub fn is_valid_target(candidate: &str) -> bool {
    match Url::parse(candidate) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host_str().is_some(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URLS: &[&str] = &[
        "https://example.com/page",
        "http://example.com",
        "https://sub.example.co.uk:8443/a/b?q=1&r=%20x#frag",
        "https://例え.jp/パス?検索=はい",
    ];

    fn codec() -> UrlCodec {
        UrlCodec::new(EncodingScheme::Base64, b"test-secret").unwrap()
    }

    #[test]
    fn test_every_scheme_decodes_back_to_the_same_url() {
        let codec = codec();
        for scheme in EncodingScheme::ALL {
            for url in URLS {
                let token = codec.encode_with(url, scheme);
                assert_eq!(codec.decode(&token).as_deref(), Some(*url), "{} {}", scheme, url);
            }
        }
    }

    #[test]
    fn test_tokens_are_path_safe() {
        let codec = codec();
        for scheme in EncodingScheme::ALL {
            let token = codec.encode_with("https://example.com/?a=b/c+d", scheme);
            assert!(
                token.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':')),
                "{}",
                token
            );
        }
    }

    #[test]
    fn test_standard_base64_with_padding_is_accepted() {
        let token = STANDARD.encode("https://example.com/page");
        assert_eq!(codec().decode(&token).as_deref(), Some("https://example.com/page"));
    }

    #[test]
    fn test_percent_encoded_raw_url_is_accepted() {
        let token = urlencoding::encode("https://example.com/x?y=1").into_owned();
        assert_eq!(codec().decode(&token).as_deref(), Some("https://example.com/x?y=1"));
    }

    #[test]
    fn test_rejects_non_http_targets() {
        let codec = codec();
        assert_eq!(codec.decode(&URL_SAFE_NO_PAD.encode("ftp://example.com/file")), None);
        assert_eq!(codec.decode(&URL_SAFE_NO_PAD.encode("javascript:alert(1)")), None);
        assert_eq!(codec.decode("not-a-token"), None);
        assert_eq!(codec.decode(""), None);
    }

    #[test]
    fn test_keyed_tokens_need_the_same_key() {
        let minted = UrlCodec::new(EncodingScheme::AesGcm, b"one").unwrap();
        let other = UrlCodec::new(EncodingScheme::AesGcm, b"two").unwrap();
        let token = minted.encode("https://example.com/secret");
        assert_eq!(other.decode(&token), None);
        assert_eq!(minted.decode(&token).as_deref(), Some("https://example.com/secret"));
    }

    #[test]
    fn test_random_key_codec_round_trips() {
        let codec = UrlCodec::with_random_key(EncodingScheme::XorHex);
        let token = codec.encode("https://example.com/");
        assert_eq!(codec.decode(&token).as_deref(), Some("https://example.com/"));
    }

    #[test]
    fn test_scheme_parsing() {
        assert_eq!("AES".parse::<EncodingScheme>().unwrap(), EncodingScheme::AesGcm);
        assert_eq!("xor-hex".parse::<EncodingScheme>().unwrap(), EncodingScheme::XorHex);
        assert!("rot13".parse::<EncodingScheme>().is_err());
        assert!(UrlCodec::new(EncodingScheme::Base64, b"").is_err());
    }
}
