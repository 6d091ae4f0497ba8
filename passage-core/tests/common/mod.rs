//! Shared fixtures: a scripted origin server and a running proxy

#![allow(dead_code)]

use bytes::Bytes;
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use passage_core::codec::{EncodingScheme, UrlCodec};
use passage_core::config::PassageConfig;
use passage_core::{ForwardProxyHandler, PassageServer};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

pub const PAGE: &str = r#"<html><head><title>Fixture</title></head><body><a href="/next">next</a><img src="img/logo.png"></body></html>"#;
pub const STYLESHEET: &str = "body{background:url(/bg.png)}";

/// Origin server on an ephemeral port that counts every request it sees
pub struct Origin {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

impl Origin {
    /// Routes: `/` HTML, `/style.css` CSS, `/data.json` JSON, `/moved` 302 to `/`,
    /// `/slow` answers after `delay`
    pub async fn start(delay: Duration) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = hits.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let counter = counter.clone();
                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                        counter.fetch_add(1, Ordering::SeqCst);
                        async move { Ok::<_, Infallible>(respond(req.uri().path(), delay).await) }
                    });
                    let _ = http1::Builder::new().serve_connection(TokioIo::new(stream), service).await;
                });
            }
        });

        Self { addr, hits }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn respond(path: &str, delay: Duration) -> Response<Full<Bytes>> {
    let (status, content_type, body) = match path {
        "/" => (StatusCode::OK, "text/html; charset=utf-8", PAGE.to_string()),
        "/style.css" => (StatusCode::OK, "text/css", STYLESHEET.to_string()),
        "/data.json" => (StatusCode::OK, "application/json", r#"{"ok":true}"#.to_string()),
        "/slow" => {
            tokio::time::sleep(delay).await;
            (StatusCode::OK, "text/plain", "finally".to_string())
        }
        "/moved" => {
            return Response::builder()
                .status(StatusCode::FOUND)
                .header("location", "/")
                .body(Full::new(Bytes::new()))
                .unwrap();
        }
        _ => (StatusCode::NOT_FOUND, "text/plain", "missing".to_string()),
    };

    Response::builder()
        .status(status)
        .header("content-type", content_type)
        .header("content-security-policy", "default-src 'self'")
        .header("set-cookie", "session=abc; Path=/")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

/// Configuration suited to local tests: ephemeral port, fixed key, short timeouts
pub fn test_config() -> PassageConfig {
    let mut config = PassageConfig::default();
    config.server.host = "127.0.0.1".to_string();
    config.server.port = 0;
    config.url_encoding.key = Some("integration-test-key".to_string());
    config.proxy.timeout = 2_000;
    config.proxy.max_attempts = 1;
    config.proxy.retry_backoff_ms = 10;
    config.rate_limit.enabled = false;
    config
}

/// A proxy serving in the background until dropped
pub struct RunningProxy {
    pub addr: SocketAddr,
    pub codec: Arc<UrlCodec>,
    pub blocklist: Arc<passage_core::filtering::BlocklistFilter>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl RunningProxy {
    pub async fn start(config: PassageConfig) -> Self {
        let handler = ForwardProxyHandler::from_config(&config).await.unwrap();
        let codec = handler.codec().clone();
        let blocklist = handler.blocklist().clone();

        let server = PassageServer::bind_with(config, handler).await.unwrap();
        let addr = server.local_addr().unwrap();

        let (tx, rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let _ = server
                .serve_with_shutdown(async {
                    let _ = rx.await;
                })
                .await;
        });

        Self { addr, codec, blocklist, shutdown: Some(tx) }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Proxy URL for `target` using the base64 scheme
    pub fn proxy_url(&self, target: &str) -> String {
        self.url(&format!("/proxy/{}", self.codec.encode_with(target, EncodingScheme::Base64)))
    }
}

impl Drop for RunningProxy {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}
