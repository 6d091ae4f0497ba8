//! Upstream fetching with per-attempt timeout and exponential backoff

use super::traits::{TargetRequest, Upstream, UpstreamResponse};
use crate::config::ProxyConfig;
use crate::error::FetchError;
use async_trait::async_trait;
use bytes::BytesMut;
use http::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, DNT, UPGRADE_INSECURE_REQUESTS};
use reqwest::redirect;
use std::error::Error as _;
use std::io;
use std::time::Duration;

/// reqwest-backed [`Upstream`]
///
/// Each attempt gets the full per-attempt timeout. Attempt `n` (from zero)
/// that fails retryably is followed by a sleep of `backoff * 2^n`.
pub struct UpstreamFetcher {
    client: reqwest::Client,
    timeout: Duration,
    max_attempts: u32,
    backoff: Duration,
    max_body: usize,
}

impl UpstreamFetcher {
    pub fn new(config: &ProxyConfig) -> reqwest::Result<Self> {
        let mut headers = HeaderMap::new();
        if let Ok(language) = HeaderValue::from_str(&config.accept_language) {
            headers.insert(ACCEPT_LANGUAGE, language);
        }
        headers.insert(DNT, HeaderValue::from_static("1"));
        headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .redirect(redirect_policy(config.max_redirects))
            .build()?;

        Ok(Self {
            client,
            timeout: config.timeout(),
            max_attempts: config.max_attempts.max(1),
            backoff: config.retry_backoff(),
            max_body: config.max_response_size,
        })
    }

    async fn attempt(&self, request: &TargetRequest) -> Result<UpstreamResponse, FetchError> {
        let send = async {
            let mut builder = self
                .client
                .request(request.method.clone(), request.url.clone())
                .headers(request.headers.clone());
            if let Some(body) = &request.body {
                builder = builder.body(body.clone());
            }

            let mut response = builder.send().await.map_err(|e| classify(&e))?;
            let status = response.status();
            let headers = response.headers().clone();
            let final_url = response.url().clone();

            let too_large = FetchError::TooLarge { limit: self.max_body };
            if response.content_length().is_some_and(|len| len > self.max_body as u64) {
                return Err(too_large);
            }
            // Content-Length may be absent or wrong, so the limit holds while reading too
            let mut body = BytesMut::new();
            while let Some(chunk) = response.chunk().await.map_err(|e| classify(&e))? {
                if body.len() + chunk.len() > self.max_body {
                    return Err(too_large);
                }
                body.extend_from_slice(&chunk);
            }

            Ok(UpstreamResponse { status, headers, body: body.freeze(), final_url })
        };

        match tokio::time::timeout(self.timeout, send).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout),
        }
    }
}

#[async_trait]
impl Upstream for UpstreamFetcher {
    async fn fetch(&self, request: &TargetRequest) -> Result<UpstreamResponse, FetchError> {
        let mut attempt = 0u32;
        loop {
            let err = match self.attempt(request).await {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };

            attempt += 1;
            if attempt >= self.max_attempts || !err.is_retryable() {
                log::error!(
                    "❌ Fetch of {} failed after {} attempt(s): {}",
                    request.url.host_str().unwrap_or("?"),
                    attempt,
                    err
                );
                return Err(err);
            }

            let delay = self.backoff.saturating_mul(2u32.saturating_pow(attempt - 1));
            log::warn!(
                "⚠️ Fetch attempt {}/{} for {} failed: {} (retrying in {:?})",
                attempt,
                self.max_attempts,
                request.url.host_str().unwrap_or("?"),
                err,
                delay
            );
            tokio::time::sleep(delay).await;
        }
    }
}

/// Follow up to `max` redirects, never from https down to http.
///
/// Stopping hands the 3xx itself back to the pipeline.
fn redirect_policy(max: usize) -> redirect::Policy {
    redirect::Policy::custom(move |attempt| {
        let previous = attempt.previous().last().map(|prev| prev.scheme());
        if should_follow(previous, attempt.url().scheme(), attempt.previous().len(), max) {
            attempt.follow()
        } else {
            attempt.stop()
        }
    })
}

/// Whether a redirect to `next_scheme` may be followed.
///
/// `hops` counts the URLs already visited, the original request included.
fn should_follow(previous_scheme: Option<&str>, next_scheme: &str, hops: usize, max: usize) -> bool {
    let downgrade = previous_scheme == Some("https") && next_scheme == "http";
    hops <= max && !downgrade
}

/// Map a reqwest failure onto the retry taxonomy
fn classify(err: &reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::Timeout;
    }

    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            match io_err.kind() {
                io::ErrorKind::ConnectionRefused => return FetchError::ConnectionRefused,
                io::ErrorKind::TimedOut => return FetchError::Timeout,
                _ => {}
            }
        }
        let text = cause.to_string().to_ascii_lowercase();
        if text.contains("dns error") || text.contains("failed to lookup address") {
            return FetchError::DnsFailure;
        }
        source = cause.source();
    }

    if err.is_connect() {
        return FetchError::ConnectionRefused;
    }
    FetchError::Other(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use url::Url;

    fn config(timeout_ms: u64, attempts: u32) -> ProxyConfig {
        ProxyConfig {
            timeout: timeout_ms,
            max_attempts: attempts,
            retry_backoff_ms: 5,
            ..ProxyConfig::default()
        }
    }

    fn get(url: &str) -> TargetRequest {
        TargetRequest {
            url: Url::parse(url).unwrap(),
            method: Method::GET,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Local origin: chain `/a` -> `/b` -> `/c` answering 200, and `/big` with 4KB
    async fn local_origin() -> std::net::SocketAddr {
        use bytes::Bytes;
        use http_body_util::Full;
        use hyper::server::conn::http1;
        use hyper::service::service_fn;
        use hyper_util::rt::TokioIo;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let service = service_fn(|req: hyper::Request<hyper::body::Incoming>| async move {
                        let next = match req.uri().path() {
                            "/a" => Some("/b"),
                            "/b" => Some("/c"),
                            _ => None,
                        };
                        let body = if req.uri().path() == "/big" {
                            Bytes::from(vec![b'x'; 4096])
                        } else {
                            Bytes::from_static(b"done")
                        };
                        let mut response = hyper::Response::new(Full::new(body));
                        if let Some(next) = next {
                            *response.status_mut() = http::StatusCode::FOUND;
                            response.headers_mut().insert(http::header::LOCATION, HeaderValue::from_static(next));
                        }
                        Ok::<_, std::convert::Infallible>(response)
                    });
                    let _ = http1::Builder::new().serve_connection(TokioIo::new(stream), service).await;
                });
            }
        });
        addr
    }

    #[test]
    fn test_redirect_rule() {
        assert!(should_follow(Some("http"), "http", 1, 5));
        assert!(should_follow(Some("http"), "https", 1, 5));
        assert!(should_follow(Some("https"), "https", 5, 5));
        assert!(!should_follow(Some("https"), "https", 6, 5));
        assert!(!should_follow(Some("https"), "http", 1, 5));
        assert!(!should_follow(Some("http"), "http", 1, 0));
    }

    #[tokio::test]
    async fn test_redirect_limit_returns_the_unfollowed_redirect() {
        let addr = local_origin().await;
        let fetcher = UpstreamFetcher::new(&ProxyConfig { max_redirects: 1, ..config(2000, 1) }).unwrap();

        let response = fetcher.fetch(&get(&format!("http://{}/a", addr))).await.unwrap();
        assert_eq!(response.status, http::StatusCode::FOUND);
        assert_eq!(response.final_url.path(), "/b");
        assert_eq!(response.headers[http::header::LOCATION], "/c");
    }

    #[tokio::test]
    async fn test_redirect_chain_is_followed_within_the_limit() {
        let addr = local_origin().await;
        let fetcher = UpstreamFetcher::new(&config(2000, 1)).unwrap();

        let response = fetcher.fetch(&get(&format!("http://{}/a", addr))).await.unwrap();
        assert_eq!(response.status, http::StatusCode::OK);
        assert_eq!(response.final_url.path(), "/c");
        assert_eq!(response.body.as_ref(), b"done");
    }

    #[tokio::test]
    async fn test_declared_oversize_body_is_rejected() {
        let addr = local_origin().await;
        let fetcher = UpstreamFetcher::new(&ProxyConfig { max_response_size: 1024, ..config(2000, 3) }).unwrap();

        let err = fetcher.fetch(&get(&format!("http://{}/big", addr))).await.unwrap_err();
        assert_eq!(err, FetchError::TooLarge { limit: 1024 });

        let small = fetcher.fetch(&get(&format!("http://{}/c", addr))).await.unwrap();
        assert_eq!(small.body.as_ref(), b"done");
    }

    #[tokio::test]
    async fn test_undeclared_oversize_body_is_cut_off() {
        use tokio::io::AsyncWriteExt;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // No Content-Length: the body runs until the connection closes
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let _ = stream.write_all(b"HTTP/1.1 200 OK\r\nConnection: close\r\n\r\n").await;
                let _ = stream.write_all(&[b'y'; 4096]).await;
                let _ = stream.shutdown().await;
            }
        });

        let fetcher = UpstreamFetcher::new(&ProxyConfig { max_response_size: 1024, ..config(2000, 1) }).unwrap();
        let err = fetcher.fetch(&get(&format!("http://{}/", addr))).await.unwrap_err();
        assert_eq!(err, FetchError::TooLarge { limit: 1024 });
    }

    #[tokio::test]
    async fn test_refused_connection_is_classified() {
        // Bind then drop to get a port nobody listens on
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let fetcher = UpstreamFetcher::new(&config(2000, 2)).unwrap();
        let err = fetcher.fetch(&get(&format!("http://127.0.0.1:{}/", port))).await.unwrap_err();
        assert_eq!(err, FetchError::ConnectionRefused);
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept and hold connections without answering
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        let fetcher = UpstreamFetcher::new(&config(100, 2)).unwrap();
        let started = std::time::Instant::now();
        let err = fetcher.fetch(&get(&format!("http://{}/", addr))).await.unwrap_err();
        assert_eq!(err, FetchError::Timeout);
        assert!(started.elapsed() >= Duration::from_millis(200));
    }
}
