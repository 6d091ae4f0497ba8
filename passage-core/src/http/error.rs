//! Uniform JSON error responses
//!
//! Every error body has the shape `{"error": code, "message": text, "timestamp": ms}`.

use super::{body_from, Resp};
use crate::error::ProxyError;
use crate::filtering::BlocklistError;
use chrono::Utc;
use http::header::{HeaderValue, ALLOW, CONTENT_TYPE, RETRY_AFTER};
use hyper::{Response, StatusCode};
use serde_json::{json, Value};

pub fn json_response(status: StatusCode, value: &Value) -> Resp {
    let mut response = Response::new(body_from(value.to_string()));
    *response.status_mut() = status;
    response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

pub fn json_error(status: StatusCode, code: &str, message: &str) -> Resp {
    json_response(
        status,
        &json!({
            "error": code,
            "message": message,
            "timestamp": Utc::now().timestamp_millis(),
        }),
    )
}

/// 405 with an `Allow` header
pub fn method_not_allowed(allowed: &'static str) -> Resp {
    let mut response = json_error(
        StatusCode::METHOD_NOT_ALLOWED,
        "MethodNotAllowed",
        &format!("Allowed methods: {}", allowed),
    );
    response.headers_mut().insert(ALLOW, HeaderValue::from_static(allowed));
    response
}

/// Terminal pipeline failure; rate limiting adds its retry headers
pub fn proxy_error_response(err: &ProxyError) -> Resp {
    let mut response = json_response(err.status(), &err.to_json());

    if let ProxyError::RateLimited { retry_after, limit } = err {
        let reset = Utc::now() + chrono::Duration::seconds(*retry_after as i64);
        let headers = response.headers_mut();
        headers.insert(RETRY_AFTER, HeaderValue::from(*retry_after));
        headers.insert("x-ratelimit-limit", HeaderValue::from(*limit));
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        if let Ok(value) = HeaderValue::from_str(&reset.to_rfc3339()) {
            headers.insert("x-ratelimit-reset", value);
        }
    }

    response
}

pub fn blocklist_error_response(err: &BlocklistError) -> Resp {
    match err {
        BlocklistError::DuplicateEntry { .. } => {
            json_error(StatusCode::CONFLICT, "DuplicateEntry", &err.to_string())
        }
        BlocklistError::InvalidPattern { .. } => {
            json_error(StatusCode::BAD_REQUEST, "InvalidPattern", &err.to_string())
        }
        BlocklistError::EmptyValue => json_error(StatusCode::BAD_REQUEST, "InvalidRequest", &err.to_string()),
        BlocklistError::Storage(detail) => {
            log::error!("❌ Blocklist storage failure: {}", detail);
            proxy_error_response(&ProxyError::Internal(detail.clone()))
        }
    }
}
