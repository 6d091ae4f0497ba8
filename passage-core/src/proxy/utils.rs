//! Helpers shared by the pipeline and the HTTP layer

use http::HeaderMap;
use std::net::SocketAddr;
use url::Url;

/// Query parameters whose values never reach the logs
const SENSITIVE_PARAMS: &[&str] =
    &["password", "token", "key", "secret", "api_key", "access_token", "auth"];

/// Connection-scoped headers that must not be relayed
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Client identity for rate limiting.
///
/// With `trust_proxy`, the first `X-Forwarded-For` hop wins, then
/// `X-Real-IP`; otherwise (or when both are absent) the socket address.
pub fn extract_client_ip(headers: &HeaderMap, remote: Option<SocketAddr>, trust_proxy: bool) -> String {
    if trust_proxy {
        if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
            if let Some(first) = forwarded.split(',').next().map(str::trim).filter(|s| !s.is_empty()) {
                return first.to_string();
            }
        }

        if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
            let real_ip = real_ip.trim();
            if !real_ip.is_empty() {
                return real_ip.to_string();
            }
        }
    }

    remote.map(|addr| addr.ip().to_string()).unwrap_or_else(|| "unknown".to_string())
}

/// Strip userinfo and redact sensitive query values
pub fn sanitize_url_for_log(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw) else {
        return raw.to_string();
    };

    if !url.username().is_empty() || url.password().is_some() {
        let _ = url.set_username("");
        let _ = url.set_password(None);
    }

    let sensitive = |name: &str| SENSITIVE_PARAMS.iter().any(|p| name.eq_ignore_ascii_case(p));
    if url.query_pairs().any(|(name, _)| sensitive(&name)) {
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(name, value)| {
                let value = if sensitive(&name) { "[REDACTED]".to_string() } else { value.into_owned() };
                (name.into_owned(), value)
            })
            .collect();
        url.query_pairs_mut().clear().extend_pairs(pairs);
    }

    url.to_string()
}

pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| name.eq_ignore_ascii_case(h))
}
