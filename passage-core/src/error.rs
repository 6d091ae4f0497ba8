//! Error taxonomy for the proxy pipeline
//!
//! Every terminal failure of a proxied request maps to one [`ProxyError`]
//! variant, which carries its HTTP status and a stable discriminant used
//! as the `error` field of the JSON body.

use chrono::Utc;
use hyper::StatusCode;
use serde_json::{json, Value};

/// Pipeline result type
pub type ProxyResult<T> = Result<T, ProxyError>;

/// Terminal failures of one proxied request
#[derive(thiserror::Error, Debug)]
pub enum ProxyError {
    #[error("The token does not decode to an absolute http or https URL")]
    InvalidEncoding,
    #[error("Access to this site has been blocked ({reason})")]
    Blocked { reason: String },
    #[error("Too many requests, retry in {retry_after} seconds")]
    RateLimited { retry_after: u64, limit: u32 },
    #[error("Request body exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: usize },
    #[error("The upstream server did not answer in time")]
    UpstreamTimeout,
    #[error("The upstream server is unreachable: {message}")]
    UpstreamUnreachable { message: String },
    #[error("Upstream request failed: {message}")]
    UpstreamOther { message: String },
    #[error("Internal proxy error: {0}")]
    Internal(String),
}

impl ProxyError {
    /// HTTP status surfaced to the client
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::InvalidEncoding => StatusCode::BAD_REQUEST,
            ProxyError::Blocked { .. } => StatusCode::FORBIDDEN,
            ProxyError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ProxyError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ProxyError::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::UpstreamUnreachable { .. } => StatusCode::BAD_GATEWAY,
            ProxyError::UpstreamOther { .. } | ProxyError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable discriminant for the `error` field
    pub fn code(&self) -> &'static str {
        match self {
            ProxyError::InvalidEncoding => "InvalidEncoding",
            ProxyError::Blocked { .. } => "Blocked",
            ProxyError::RateLimited { .. } => "RateLimited",
            ProxyError::PayloadTooLarge { .. } => "PayloadTooLarge",
            ProxyError::UpstreamTimeout => "UpstreamTimeout",
            ProxyError::UpstreamUnreachable { .. } => "UpstreamUnreachable",
            ProxyError::UpstreamOther { .. } => "UpstreamOther",
            ProxyError::Internal(_) => "Internal",
        }
    }

    /// JSON body: `{error, message, timestamp}` plus variant extras
    pub fn to_json(&self) -> Value {
        let mut body = json!({
            "error": self.code(),
            "message": self.public_message(),
            "timestamp": Utc::now().timestamp_millis(),
        });

        match self {
            ProxyError::Blocked { reason } => {
                body["reason"] = json!(reason);
            }
            ProxyError::RateLimited { retry_after, .. } => {
                body["retryAfter"] = json!(retry_after);
            }
            _ => {}
        }

        body
    }

    /// Message safe to show to clients. Internal details stay in the logs.
    fn public_message(&self) -> String {
        match self {
            ProxyError::Blocked { .. } => "Access to this site has been blocked".to_string(),
            ProxyError::Internal(_) => "The proxy failed to process the request".to_string(),
            other => other.to_string(),
        }
    }
}

/// Why an upstream fetch failed after all attempts
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("timed out")]
    Timeout,
    #[error("connection refused")]
    ConnectionRefused,
    #[error("DNS lookup failed")]
    DnsFailure,
    #[error("response body exceeds the {limit} byte limit")]
    TooLarge { limit: usize },
    #[error("{0}")]
    Other(String),
}

impl FetchError {
    /// Whether another attempt may succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FetchError::DnsFailure | FetchError::TooLarge { .. })
    }
}

impl From<FetchError> for ProxyError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Timeout => ProxyError::UpstreamTimeout,
            FetchError::ConnectionRefused | FetchError::DnsFailure => {
                ProxyError::UpstreamUnreachable { message: err.to_string() }
            }
            FetchError::TooLarge { .. } => ProxyError::UpstreamOther { message: err.to_string() },
            FetchError::Other(message) => ProxyError::UpstreamOther { message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ProxyError::InvalidEncoding.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ProxyError::Blocked { reason: "ad".into() }.status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ProxyError::RateLimited { retry_after: 3, limit: 10 }.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(ProxyError::UpstreamTimeout.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            ProxyError::from(FetchError::ConnectionRefused).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ProxyError::from(FetchError::Other("boom".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ProxyError::from(FetchError::TooLarge { limit: 1024 }).code(),
            "UpstreamOther"
        );
    }

    #[test]
    fn test_json_body_shape() {
        let body = ProxyError::Blocked { reason: "Advertisement domain".into() }.to_json();
        assert_eq!(body["error"], "Blocked");
        assert_eq!(body["reason"], "Advertisement domain");
        assert!(body["timestamp"].as_i64().is_some());

        let body = ProxyError::RateLimited { retry_after: 7, limit: 100 }.to_json();
        assert_eq!(body["error"], "RateLimited");
        assert_eq!(body["retryAfter"], 7);
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let body = ProxyError::Internal("/var/lib/passage exploded".into()).to_json();
        assert!(!body["message"].as_str().unwrap().contains("/var/lib"));
    }

    #[test]
    fn test_dns_failure_is_not_retried() {
        assert!(!FetchError::DnsFailure.is_retryable());
        assert!(FetchError::Timeout.is_retryable());
        assert!(FetchError::ConnectionRefused.is_retryable());
        assert!(!FetchError::TooLarge { limit: 10 }.is_retryable());
    }
}
