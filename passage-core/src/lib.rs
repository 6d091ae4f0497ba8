//! Passage - rewriting forward proxy engine
//!
//! A client asks for `/proxy/{token}` where the token encodes an arbitrary
//! http/https URL. Passage decodes it, applies rate limiting and the
//! blocklist, serves from cache or fetches upstream, rewrites HTML and CSS so
//! the page renders under the proxy's origin, and answers.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use passage_core::config::PassageConfig;
//! use passage_core::http::PassageServer;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = PassageConfig::load()?;
//!     PassageServer::bind(config).await?.serve().await
//! }
//! ```
//!
//! # Architecture
//!
//! - [`codec`] - URL tokens (base64, XOR hex, AES-GCM)
//! - [`filtering`] - advertisement, malicious and custom blocklists
//! - [`cache`] - bounded TTL response cache with LRU eviction
//! - [`rewrite`] - HTML/CSS link rewriting and protection snippet
//! - [`security`] - sliding-window rate limiter, CORS and hardening headers
//! - [`proxy`] - upstream fetch with retry and the request pipeline
//! - [`http`] - hyper server and routes
//! - [`config`] - layered TOML + environment configuration

pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod filtering;
pub mod http;
pub mod logging;
pub mod proxy;
pub mod rewrite;
pub mod security;

pub use codec::{EncodingScheme, UrlCodec};
pub use config::PassageConfig;
pub use error::{FetchError, ProxyError, ProxyResult};
pub use http::PassageServer;
pub use proxy::ForwardProxyHandler;
