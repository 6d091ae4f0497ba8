//! Passage Security Module
//!
//! - **Rate limiting**: per-client sliding window ([`rate_limit`])
//! - **Response hardening**: CORS and browser security headers ([`headers`])

pub mod headers;
pub mod rate_limit;

pub use headers::{apply_cors_headers, apply_security_headers, preflight_headers};
pub use rate_limit::{Admission, RateLimitPolicy, RateLimitStats, RateLimiter};
