//! Request/response types flowing through the proxy pipeline, and the
//! upstream seam the pipeline fetches through

use crate::error::FetchError;
use async_trait::async_trait;
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, Method, StatusCode};
use url::Url;

/// A client request for `/proxy/{token}` as seen by the pipeline
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub token: String,
    pub client_id: String,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl InboundRequest {
    pub fn get(token: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            client_id: client_id.into(),
            method: Method::GET,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }
}

/// The upstream request derived from a decoded token
#[derive(Debug, Clone)]
pub struct TargetRequest {
    pub url: Url,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

/// Fully buffered upstream response
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// URL after redirects were followed
    pub final_url: Url,
}

impl UpstreamResponse {
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }
}

/// Whether a reply came from the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

/// Successful pipeline outcome, ready to be written to the client
#[derive(Debug, Clone)]
pub struct ProxyReply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub cache: CacheStatus,
}

/// Something that can perform a [`TargetRequest`]
///
/// Implementations own retry and timeout policy; the error is the final one.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn fetch(&self, request: &TargetRequest) -> Result<UpstreamResponse, FetchError>;
}
