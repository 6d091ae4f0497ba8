//! Bot-challenge detection seam
//!
//! The pipeline asks an optional [`ChallengeSolver`] whether an upstream
//! response is a challenge page, and refetches once when a solver reports
//! success. [`ChallengeDetector`] recognizes the common interstitials but
//! never solves anything.

use super::traits::{TargetRequest, UpstreamResponse};
use async_trait::async_trait;
use http::StatusCode;

/// Only the head of a body is scanned for markers
const SCAN_LIMIT: usize = 64 * 1024;

#[async_trait]
pub trait ChallengeSolver: Send + Sync {
    /// Whether the response is a challenge page
    fn detect(&self, response: &UpstreamResponse) -> bool;

    /// Try to clear the challenge; `true` means a refetch should now pass
    async fn attempt_solve(&self, request: &TargetRequest, response: &UpstreamResponse) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeKind {
    Cloudflare,
    HCaptcha,
    ReCaptcha,
}

/// Marker-based detector without solving capability
#[derive(Debug, Default, Clone)]
pub struct ChallengeDetector;

impl ChallengeDetector {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, response: &UpstreamResponse) -> Option<ChallengeKind> {
        let is_html = response
            .content_type()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("text/html"));
        if !is_html {
            return None;
        }

        let blocked_status = matches!(
            response.status,
            StatusCode::FORBIDDEN | StatusCode::SERVICE_UNAVAILABLE | StatusCode::TOO_MANY_REQUESTS
        );
        if blocked_status && response.headers.contains_key("cf-ray") {
            return Some(ChallengeKind::Cloudflare);
        }

        let head = &response.body[..response.body.len().min(SCAN_LIMIT)];
        let text = String::from_utf8_lossy(head).to_ascii_lowercase();

        if text.contains("cf-browser-verification")
            || text.contains("just a moment...")
            || text.contains("checking your browser")
        {
            Some(ChallengeKind::Cloudflare)
        } else if text.contains("hcaptcha.com/1/api.js") || text.contains("class=\"h-captcha\"") {
            Some(ChallengeKind::HCaptcha)
        } else if text.contains("google.com/recaptcha/api") || text.contains("class=\"g-recaptcha\"") {
            Some(ChallengeKind::ReCaptcha)
        } else {
            None
        }
    }
}

#[async_trait]
impl ChallengeSolver for ChallengeDetector {
    fn detect(&self, response: &UpstreamResponse) -> bool {
        self.classify(response).is_some()
    }

    async fn attempt_solve(&self, request: &TargetRequest, response: &UpstreamResponse) -> bool {
        log::warn!(
            "🤖 {:?} challenge at {}, no solver available",
            self.classify(response),
            request.url.host_str().unwrap_or("?")
        );
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
    use http::Method;
    use url::Url;

    fn response(status: StatusCode, body: &str, cf_ray: bool) -> UpstreamResponse {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));
        if cf_ray {
            headers.insert("cf-ray", HeaderValue::from_static("8a1b2c3d4e5f-NRT"));
        }
        UpstreamResponse {
            status,
            headers,
            body: Bytes::from(body.to_string()),
            final_url: Url::parse("https://example.com/").unwrap(),
        }
    }

    #[test]
    fn test_cloudflare_by_header_and_status() {
        let detector = ChallengeDetector::new();
        assert_eq!(
            detector.classify(&response(StatusCode::FORBIDDEN, "", true)),
            Some(ChallengeKind::Cloudflare)
        );
        // A normal page served through Cloudflare is not a challenge
        assert_eq!(detector.classify(&response(StatusCode::OK, "<p>hello</p>", true)), None);
    }

    #[test]
    fn test_markers_in_body() {
        let detector = ChallengeDetector::new();
        assert_eq!(
            detector.classify(&response(StatusCode::OK, "<title>Just a moment...</title>", false)),
            Some(ChallengeKind::Cloudflare)
        );
        assert_eq!(
            detector.classify(&response(
                StatusCode::OK,
                r#"<script src="https://js.hcaptcha.com/1/api.js"></script>"#,
                false
            )),
            Some(ChallengeKind::HCaptcha)
        );
        assert_eq!(
            detector.classify(&response(
                StatusCode::OK,
                r#"<div class="g-recaptcha" data-sitekey="x"></div>"#,
                false
            )),
            Some(ChallengeKind::ReCaptcha)
        );
    }

    #[tokio::test]
    async fn test_detector_never_solves() {
        let detector = ChallengeDetector::new();
        let challenge = response(StatusCode::FORBIDDEN, "", true);
        let request = TargetRequest {
            url: challenge.final_url.clone(),
            method: Method::GET,
            headers: HeaderMap::new(),
            body: None,
        };
        assert!(detector.detect(&challenge));
        assert!(!detector.attempt_solve(&request, &challenge).await);
    }
}
