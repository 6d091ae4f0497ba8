//! Listener and connection loop

use super::routes::{self, AppState};
use crate::config::PassageConfig;
use crate::proxy::ForwardProxyHandler;
use anyhow::{Context, Result};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A bound proxy server, ready to serve
pub struct PassageServer {
    listener: TcpListener,
    state: Arc<AppState>,
}

impl PassageServer {
    /// Build the pipeline from configuration and bind `server.host:server.port`
    pub async fn bind(config: PassageConfig) -> Result<Self> {
        let handler = ForwardProxyHandler::from_config(&config).await?;
        Self::bind_with(config, handler).await
    }

    /// Bind with an already assembled pipeline
    pub async fn bind_with(config: PassageConfig, handler: ForwardProxyHandler) -> Result<Self> {
        let addr = config.server.bind_address();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind to {}", addr))?;

        Ok(Self { listener, state: Arc::new(AppState::new(handler, config)) })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Serve until Ctrl-C
    pub async fn serve(self) -> Result<()> {
        self.serve_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("❌ Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Serve until `signal` resolves. In-flight connections finish on their own.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let addr = self.listener.local_addr()?;
        log::info!("✅ Passage listening on http://{}", addr);
        log::info!("   ✓ Proxy endpoint: http://{}/proxy/{{token}}", addr);

        let sweeps = self.spawn_sweeps();
        tokio::pin!(signal);

        loop {
            tokio::select! {
                _ = &mut signal => {
                    log::info!("🛑 Shutdown requested, no longer accepting connections");
                    break;
                }
                accepted = self.listener.accept() => {
                    let (stream, remote_addr) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            log::warn!("⚠️ Failed to accept connection: {}", e);
                            continue;
                        }
                    };
                    let state = self.state.clone();

                    tokio::spawn(async move {
                        let io = TokioIo::new(stream);

                        let service = service_fn(move |req| {
                            let state = state.clone();
                            async move {
                                Ok::<_, Infallible>(routes::route(state, req, Some(remote_addr)).await)
                            }
                        });

                        if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                            log::error!("Connection error from {}: {}", remote_addr, err);
                        }
                    });
                }
            }
        }

        for task in sweeps {
            task.abort();
        }
        Ok(())
    }

    /// Periodic cache expiry and rate-limiter cleanup
    fn spawn_sweeps(&self) -> Vec<JoinHandle<()>> {
        let mut tasks = Vec::new();
        let handler = &self.state.handler;

        if let Some(cache) = handler.cache().cloned() {
            let every = self.state.config.cache.sweep_interval();
            tasks.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(every);
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    let evicted = cache.evict_expired().await;
                    if evicted > 0 {
                        log::info!("🧹 Evicted {} expired cache entries", evicted);
                    }
                }
            }));
        }

        if let Some(limiter) = handler.rate_limiter().cloned() {
            let every = limiter.policy().window;
            tasks.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(every);
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    let dropped = limiter.sweep().await;
                    if dropped > 0 {
                        log::debug!("🧹 Dropped {} idle rate-limit clients", dropped);
                    }
                }
            }));
        }

        tasks
    }
}
