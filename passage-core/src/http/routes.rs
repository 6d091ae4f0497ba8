//! Request dispatch for the proxy's HTTP surface

use super::error::{blocklist_error_response, json_error, json_response, method_not_allowed, proxy_error_response};
use super::{body_from, Resp};
use crate::codec::EncodingScheme;
use crate::config::PassageConfig;
use crate::error::ProxyError;
use crate::filtering::{lists, BlocklistEntry, EntryKind};
use crate::proxy::{extract_client_ip, CacheStatus, ForwardProxyHandler, InboundRequest, PROXY_PREFIX};
use crate::security::{apply_cors_headers, apply_security_headers, preflight_headers};
use bytes::Bytes;
use chrono::Utc;
use http::header::HeaderValue;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::{Method, Request, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

/// Largest accepted body on the admin API
const API_BODY_LIMIT: usize = 64 * 1024;

/// Shared server state
pub struct AppState {
    pub handler: Arc<ForwardProxyHandler>,
    pub config: Arc<PassageConfig>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(handler: ForwardProxyHandler, config: PassageConfig) -> Self {
        Self { handler: Arc::new(handler), config: Arc::new(config), started_at: Instant::now() }
    }
}

/// Payload of `POST /api/blocklist`
#[derive(Debug, Deserialize)]
struct NewEntry {
    #[serde(rename = "type")]
    kind: EntryKind,
    value: String,
    reason: Option<String>,
}

/// Dispatch one request. Every response carries the CORS and security headers.
pub async fn route<B>(state: Arc<AppState>, req: Request<B>, remote: Option<SocketAddr>) -> Resp
where
    B: Body<Data = Bytes> + Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let started = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let is_proxy = path.starts_with(PROXY_PREFIX);

    let mut response = if method == Method::OPTIONS {
        preflight()
    } else if is_proxy {
        proxy(&state, req, remote).await
    } else {
        match (&method, path.as_str()) {
            (&Method::GET, "/health") => health(&state),
            (&Method::GET, "/api/config") => config_summary(&state),
            (&Method::GET, "/api/stats") => stats(&state).await,
            (&Method::GET, "/api/blocklist") => list_entries(&state).await,
            (&Method::POST, "/api/blocklist") => add_entry(&state, req).await,
            (&Method::DELETE, "/api/blocklist") => remove_entries(&state, req.uri().query()).await,
            (_, "/health" | "/api/config" | "/api/stats") => method_not_allowed("GET"),
            (_, "/api/blocklist") => method_not_allowed("GET, POST, DELETE"),
            _ => json_error(StatusCode::NOT_FOUND, "NotFound", &format!("No route for {}", path)),
        }
    };

    apply_security_headers(response.headers_mut());
    apply_cors_headers(response.headers_mut());

    log::debug!(
        "{} {} -> {} ({}ms)",
        method,
        if is_proxy { "/proxy/*" } else { path.as_str() },
        response.status().as_u16(),
        started.elapsed().as_millis()
    );
    response
}

fn preflight() -> Resp {
    let mut response = Response::new(body_from(Bytes::new()));
    *response.status_mut() = StatusCode::NO_CONTENT;
    *response.headers_mut() = preflight_headers();
    response
}

async fn proxy<B>(state: &AppState, req: Request<B>, remote: Option<SocketAddr>) -> Resp
where
    B: Body<Data = Bytes> + Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let started = Instant::now();
    let client_id = extract_client_ip(req.headers(), remote, state.config.server.trust_proxy);
    let token = req.uri().path()[PROXY_PREFIX.len()..].to_string();

    let (parts, body) = req.into_parts();
    let limit = state.config.proxy.max_request_size;
    let mut response = match Limited::new(body, limit).collect().await {
        Ok(collected) => {
            let body = collected.to_bytes();
            let request = InboundRequest { token, client_id, method: parts.method, headers: parts.headers, body };
            match state.handler.handle(request).await {
                Ok(reply) => {
                    let mut response = Response::new(body_from(reply.body));
                    *response.status_mut() = reply.status;
                    *response.headers_mut() = reply.headers;
                    response.headers_mut().insert("x-cache", HeaderValue::from_static(reply.cache.as_str()));
                    response
                }
                Err(err) => {
                    if let ProxyError::Internal(detail) | ProxyError::UpstreamOther { message: detail } = &err {
                        log::error!("❌ Proxy error: {}", detail);
                    }
                    proxy_error_response(&err)
                }
            }
        }
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            proxy_error_response(&ProxyError::PayloadTooLarge { limit })
        }
        Err(e) => {
            log::warn!("⚠️ Failed to read request body from {}: {}", client_id, e);
            json_error(StatusCode::BAD_REQUEST, "InvalidRequest", "Could not read request body")
        }
    };

    // Error replies never come from the cache
    if !response.headers().contains_key("x-cache") {
        response.headers_mut().insert("x-cache", HeaderValue::from_static(CacheStatus::Miss.as_str()));
    }

    let elapsed = format!("{}ms", started.elapsed().as_millis());
    if let Ok(value) = HeaderValue::from_str(&elapsed) {
        response.headers_mut().insert("x-proxy-time", value);
    }
    response
}

/// Human-readable uptime: `45s`, `2m5s`, `1h2m3s`
pub fn format_uptime(uptime_seconds: u64) -> String {
    let hours = uptime_seconds / 3600;
    let minutes = (uptime_seconds % 3600) / 60;
    let seconds = uptime_seconds % 60;

    if hours > 0 {
        format!("{}h{}m{}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m{}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

fn health(state: &AppState) -> Resp {
    let uptime = state.started_at.elapsed().as_secs();
    json_response(
        StatusCode::OK,
        &json!({
            "status": "ok",
            "uptime": format_uptime(uptime),
            "uptimeSeconds": uptime,
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": Utc::now().to_rfc3339(),
        }),
    )
}

/// Read-only feature summary; the shared key is never exposed
fn config_summary(state: &AppState) -> Resp {
    let config = &state.config;
    json_response(
        StatusCode::OK,
        &json!({
            "features": {
                "cache": config.cache.enabled,
                "rateLimit": config.rate_limit.enabled,
                "adblock": config.adblock.enabled,
                "captcha": config.captcha.enabled,
                "blocklistPersistence": config.blocklist.path.is_some(),
            },
            "adblock": {
                "enabled": config.adblock.enabled,
                "adDomains": lists::AD_DOMAINS.len(),
                "maliciousDomains": lists::MALICIOUS_DOMAINS.len(),
            },
            "urlEncoding": {
                "scheme": state.handler.codec().scheme().as_str(),
                "supported": EncodingScheme::ALL.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
            },
            "cache": {
                "ttl": config.cache.ttl,
                "maxSize": config.cache.max_size,
            },
            "rateLimit": {
                "windowMs": config.rate_limit.window_ms,
                "maxRequests": config.rate_limit.max_requests,
            },
            "proxy": {
                "timeout": config.proxy.timeout,
                "maxAttempts": config.proxy.max_attempts,
                "maxRedirects": config.proxy.max_redirects,
                "maxResponseSize": config.proxy.max_response_size,
            },
        }),
    )
}

async fn stats(state: &AppState) -> Resp {
    let handler = &state.handler;
    let cache = match handler.cache() {
        Some(cache) => Some(cache.stats().await),
        None => None,
    };
    let rate_limit = match handler.rate_limiter() {
        Some(limiter) => Some(limiter.stats().await),
        None => None,
    };

    json_response(
        StatusCode::OK,
        &json!({
            "cache": cache,
            "blocklist": handler.blocklist().stats().await,
            "rateLimit": rate_limit,
            "uptimeSeconds": state.started_at.elapsed().as_secs(),
        }),
    )
}

async fn list_entries(state: &AppState) -> Resp {
    let entries = state.handler.blocklist().entries().await;
    json_response(StatusCode::OK, &json!({ "count": entries.len(), "entries": entries }))
}

async fn add_entry<B>(state: &AppState, req: Request<B>) -> Resp
where
    B: Body<Data = Bytes> + Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let body = match Limited::new(req.into_body(), API_BODY_LIMIT).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(_) => return json_error(StatusCode::BAD_REQUEST, "InvalidRequest", "Could not read request body"),
    };
    let new: NewEntry = match serde_json::from_slice(&body) {
        Ok(new) => new,
        Err(e) => {
            return json_error(StatusCode::BAD_REQUEST, "InvalidRequest", &format!("Invalid entry: {}", e))
        }
    };

    let entry = BlocklistEntry::new(new.kind, new.value.trim(), new.reason);
    match state.handler.blocklist().add(entry).await {
        Ok(added) => json_response(StatusCode::CREATED, &json!(added)),
        Err(e) => blocklist_error_response(&e),
    }
}

async fn remove_entries(state: &AppState, query: Option<&str>) -> Resp {
    let value = query.and_then(|q| {
        url::form_urlencoded::parse(q.as_bytes())
            .find(|(name, _)| name == "value")
            .map(|(_, value)| value.into_owned())
    });

    match value.filter(|v| !v.trim().is_empty()) {
        Some(value) => {
            let removed = state.handler.blocklist().remove(value.trim()).await;
            json_response(StatusCode::OK, &json!({ "removed": removed }))
        }
        None => json_error(StatusCode::BAD_REQUEST, "InvalidRequest", "Missing 'value' query parameter"),
    }
}
