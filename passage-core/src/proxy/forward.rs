//! Rewriting forward proxy pipeline
//!
//! One request walks the stages of [`PipelineStage`] strictly in order:
//! decode, rate check, block check, cache lookup, then either replay the
//! cached payload or fetch, rewrite and store. Rejections and failures end
//! the walk with a [`ProxyError`].

use super::challenge::{ChallengeDetector, ChallengeSolver};
use super::fetch::UpstreamFetcher;
use super::traits::{CacheStatus, InboundRequest, ProxyReply, TargetRequest, Upstream, UpstreamResponse};
use super::utils::{is_hop_by_hop, sanitize_url_for_log};
use crate::cache::{CachedResponse, ResponseCache};
use crate::codec::UrlCodec;
use crate::config::PassageConfig;
use crate::error::{ProxyError, ProxyResult};
use crate::filtering::{BlocklistFilter, JsonFileStore};
use crate::rewrite::{origin_root, Rewriter};
use crate::security::{Admission, RateLimitPolicy, RateLimiter};
use anyhow::Context;
use bytes::Bytes;
use http::header::{
    HeaderMap, HeaderValue, ACCEPT, CONTENT_ENCODING, CONTENT_TYPE,
    COOKIE, LOCATION, RANGE, STRICT_TRANSPORT_SECURITY,
};
use http::{Method, StatusCode};
use std::sync::Arc;
use url::Url;

/// Path prefix of proxied resources
pub const PROXY_PREFIX: &str = "/proxy/";

/// Upstream headers that would break embedding or conflict with ours
const STRIPPED_HEADERS: &[&str] = &[
    "content-security-policy",
    "content-security-policy-report-only",
    "x-frame-options",
    "content-length",
];

const DEFAULT_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PipelineStage {
    Decoding,
    RateCheck,
    BlockCheck,
    CacheLookup,
    Fetching,
    Rewriting,
    CacheStore,
    Respond,
}

/// Enforces forward-only stage transitions
#[derive(Debug, Default)]
struct StageTracker {
    current: Option<PipelineStage>,
}

impl StageTracker {
    fn enter(&mut self, stage: PipelineStage) {
        debug_assert!(self.current < Some(stage), "stage {:?} after {:?}", stage, self.current);
        log::debug!("➡️ Pipeline stage {:?}", stage);
        self.current = Some(stage);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RewriteKind {
    Html,
    Css,
}

/// The request pipeline with its shared collaborators
pub struct ForwardProxyHandler {
    codec: Arc<UrlCodec>,
    blocklist: Arc<BlocklistFilter>,
    upstream: Arc<dyn Upstream>,
    rewriter: Rewriter,
    cache: Option<Arc<ResponseCache>>,
    limiter: Option<Arc<RateLimiter>>,
    solver: Option<Arc<dyn ChallengeSolver>>,
    sanitize_logs: bool,
}

impl ForwardProxyHandler {
    /// Pipeline without cache, rate limiting or challenge handling
    pub fn new(
        codec: Arc<UrlCodec>,
        blocklist: Arc<BlocklistFilter>,
        upstream: Arc<dyn Upstream>,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            codec,
            blocklist,
            upstream,
            rewriter: Rewriter::new()?,
            cache: None,
            limiter: None,
            solver: None,
            sanitize_logs: true,
        })
    }

    pub fn with_cache(mut self, cache: Arc<ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn with_challenge_solver(mut self, solver: Arc<dyn ChallengeSolver>) -> Self {
        self.solver = Some(solver);
        self
    }

    pub fn with_log_sanitizing(mut self, enabled: bool) -> Self {
        self.sanitize_logs = enabled;
        self
    }

    /// Wire every collaborator from configuration and load the stored blocklist
    pub async fn from_config(config: &PassageConfig) -> anyhow::Result<Self> {
        let codec = UrlCodec::from_config(&config.url_encoding).context("Invalid urlEncoding settings")?;

        let blocklist = match &config.blocklist.path {
            Some(path) => {
                BlocklistFilter::with_store(config.adblock.enabled, Arc::new(JsonFileStore::new(path)))
            }
            None => BlocklistFilter::new(config.adblock.enabled),
        };
        blocklist.load().await.context("Failed to load the blocklist")?;

        let fetcher = UpstreamFetcher::new(&config.proxy).context("Failed to build the HTTP client")?;

        let mut handler = Self::new(Arc::new(codec), Arc::new(blocklist), Arc::new(fetcher))
            .context("Failed to compile rewrite patterns")?
            .with_log_sanitizing(config.logging.sanitize_urls);

        if config.cache.enabled {
            handler = handler
                .with_cache(Arc::new(ResponseCache::new(config.cache.max_size, config.cache.ttl())));
        }
        if config.rate_limit.enabled {
            handler = handler
                .with_rate_limiter(Arc::new(RateLimiter::new(RateLimitPolicy::from(&config.rate_limit))));
        }
        if config.captcha.enabled {
            handler = handler.with_challenge_solver(Arc::new(ChallengeDetector::new()));
        }

        Ok(handler)
    }

    pub fn codec(&self) -> &Arc<UrlCodec> {
        &self.codec
    }

    pub fn blocklist(&self) -> &Arc<BlocklistFilter> {
        &self.blocklist
    }

    pub fn cache(&self) -> Option<&Arc<ResponseCache>> {
        self.cache.as_ref()
    }

    pub fn rate_limiter(&self) -> Option<&Arc<RateLimiter>> {
        self.limiter.as_ref()
    }

    /// Run one request through the pipeline
    pub async fn handle(&self, request: InboundRequest) -> ProxyResult<ProxyReply> {
        let mut stages = StageTracker::default();

        stages.enter(PipelineStage::Decoding);
        let raw_url = self.codec.decode(&request.token).ok_or(ProxyError::InvalidEncoding)?;
        let target = Url::parse(&raw_url).map_err(|_| ProxyError::InvalidEncoding)?;

        stages.enter(PipelineStage::RateCheck);
        let mut rate_headers = HeaderMap::new();
        if let Some(limiter) = &self.limiter {
            match limiter.admit(&request.client_id).await {
                Admission::Allowed { limit, remaining } => {
                    rate_headers.insert("x-ratelimit-limit", HeaderValue::from(limit));
                    rate_headers.insert("x-ratelimit-remaining", HeaderValue::from(remaining));
                }
                Admission::Denied { limit, retry_after_secs, .. } => {
                    return Err(ProxyError::RateLimited { retry_after: retry_after_secs, limit });
                }
            }
        }

        stages.enter(PipelineStage::BlockCheck);
        if let Some(reason) = self.blocklist.classify(&target).await.reason() {
            log::warn!("🚫 Blocked {} ({})", self.loggable(&raw_url), reason);
            return Err(ProxyError::Blocked { reason });
        }

        stages.enter(PipelineStage::CacheLookup);
        let cache_key = is_cacheable_request(&request).then(|| ResponseCache::key_for(&raw_url));
        if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
            if let Some(hit) = cache.get(key).await {
                log::info!("📦 Cache hit for {}", self.loggable(&raw_url));
                stages.enter(PipelineStage::Respond);
                let mut headers = hit.headers;
                headers.extend(rate_headers);
                return Ok(ProxyReply { status: StatusCode::OK, headers, body: hit.body, cache: CacheStatus::Hit });
            }
        }

        stages.enter(PipelineStage::Fetching);
        log::info!("🌐 Proxying {} {}", request.method, self.loggable(&raw_url));
        let target_request = target_request(target, &request);
        let mut response = self.upstream.fetch(&target_request).await?;
        if let Some(solver) = &self.solver {
            if solver.detect(&response) && solver.attempt_solve(&target_request, &response).await {
                log::info!("🤖 Challenge cleared, refetching {}", self.loggable(&raw_url));
                response = self.upstream.fetch(&target_request).await?;
            }
        }

        stages.enter(PipelineStage::Rewriting);
        let (body, rewritten) = self.rewrite_body(&response);
        let mut headers = relay_headers(&response.headers, rewritten);
        if response.status.is_redirection() {
            self.reencode_location(&mut headers, &response.final_url);
        }

        stages.enter(PipelineStage::CacheStore);
        if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
            let content_type = response.content_type();
            // Hits replay only Content-Type, so encoded bodies would lose their encoding
            let storable = response.status == StatusCode::OK
                && content_type.is_some_and(is_cacheable_type)
                && !is_encoded(&response.headers);
            if storable {
                cache.set(key, CachedResponse::new(content_type, body.clone())).await;
            }
        }

        stages.enter(PipelineStage::Respond);
        headers.extend(rate_headers);
        Ok(ProxyReply { status: response.status, headers, body, cache: CacheStatus::Miss })
    }

    /// Rewritten body for HTML and CSS, the original bytes otherwise.
    ///
    /// The flag tells whether the body differs from what upstream sent.
    fn rewrite_body(&self, response: &UpstreamResponse) -> (Bytes, bool) {
        let passthrough = (response.body.clone(), false);

        let Some(kind) = response.content_type().and_then(rewrite_kind) else {
            return passthrough;
        };
        if response.body.is_empty() || is_encoded(&response.headers) {
            return passthrough;
        }
        let Ok(text) = std::str::from_utf8(&response.body) else {
            log::debug!("Body of {} is not UTF-8, passing through", response.final_url);
            return passthrough;
        };
        let Some(origin) = origin_root(&response.final_url) else {
            return passthrough;
        };

        let output = match kind {
            RewriteKind::Html => self.rewriter.rewrite_html(text, &origin),
            RewriteKind::Css => self.rewriter.rewrite_css(text, &origin),
        };
        (Bytes::from(output), true)
    }

    /// Point a relayed redirect back through the proxy
    fn reencode_location(&self, headers: &mut HeaderMap, base: &Url) {
        let Some(location) = headers.get(LOCATION).and_then(|v| v.to_str().ok()) else {
            return;
        };
        let Ok(resolved) = base.join(location) else {
            return;
        };
        if !matches!(resolved.scheme(), "http" | "https") {
            return;
        }

        let proxied = format!("{}{}", PROXY_PREFIX, self.codec.encode(resolved.as_str()));
        if let Ok(value) = HeaderValue::from_str(&proxied) {
            log::info!("↪️ Relaying redirect to {}", self.loggable(resolved.as_str()));
            headers.insert(LOCATION, value);
        }
    }

    fn loggable(&self, url: &str) -> String {
        if self.sanitize_logs {
            sanitize_url_for_log(url)
        } else {
            url.to_string()
        }
    }
}

fn target_request(url: Url, request: &InboundRequest) -> TargetRequest {
    let mut headers = HeaderMap::new();
    // Client headers forwarded upstream
    for name in [COOKIE, RANGE, ACCEPT, CONTENT_TYPE] {
        for value in request.headers.get_all(&name) {
            headers.append(name.clone(), value.clone());
        }
    }
    if !headers.contains_key(ACCEPT) {
        headers.insert(ACCEPT, HeaderValue::from_static(DEFAULT_ACCEPT));
    }

    let carries_body = !matches!(request.method, Method::GET | Method::HEAD) && !request.body.is_empty();
    TargetRequest {
        url,
        method: request.method.clone(),
        headers,
        body: carries_body.then(|| request.body.clone()),
    }
}

/// Upstream headers minus hop-by-hop, framing and embedding blockers.
///
/// `Set-Cookie` is relayed. `Content-Encoding` goes when the body was rewritten.
fn relay_headers(upstream: &HeaderMap, rewritten: bool) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in upstream {
        let lower = name.as_str();
        if is_hop_by_hop(lower)
            || STRIPPED_HEADERS.contains(&lower)
            || lower.starts_with("access-control-")
            || *name == STRICT_TRANSPORT_SECURITY
            || (rewritten && (*name == CONTENT_ENCODING || lower == "etag"))
        {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}

fn is_cacheable_request(request: &InboundRequest) -> bool {
    request.method == Method::GET && !request.headers.contains_key(RANGE)
}

fn mime_essence(content_type: &str) -> String {
    content_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase()
}

fn rewrite_kind(content_type: &str) -> Option<RewriteKind> {
    match mime_essence(content_type).as_str() {
        "text/html" | "application/xhtml+xml" => Some(RewriteKind::Html),
        "text/css" => Some(RewriteKind::Css),
        _ => None,
    }
}

/// Documents, stylesheets and binary media
pub fn is_cacheable_type(content_type: &str) -> bool {
    let essence = mime_essence(content_type);
    matches!(essence.as_str(), "text/html" | "text/css")
        || ["image/", "font/", "audio/", "video/"].iter().any(|prefix| essence.starts_with(prefix))
}

fn is_encoded(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|encoding| !encoding.trim().eq_ignore_ascii_case("identity"))
}
