//! `passage serve`

use anyhow::Result;
use passage_core::config::PassageConfig;
use passage_core::logging::init_logging;
use passage_core::PassageServer;
use std::path::Path;

pub async fn run(config_path: &Path, host: Option<String>, port: Option<u16>) -> Result<()> {
    let mut config = PassageConfig::load_from(config_path)?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    config.validate()?;

    init_logging(&config.logging);

    log::info!("🚀 Starting Passage v{}", env!("CARGO_PKG_VERSION"));
    log::info!("   ✓ URL scheme: {}", config.url_encoding.scheme);
    if config.cache.enabled {
        log::info!("   ✓ Cache: {} entries, ttl {}s", config.cache.max_size, config.cache.ttl);
    }
    if config.rate_limit.enabled {
        log::info!(
            "   ✓ Rate limit: {} requests per {}ms",
            config.rate_limit.max_requests,
            config.rate_limit.window_ms
        );
    }
    if config.adblock.enabled {
        log::info!("   ✓ Adblock enabled");
    }
    if config.captcha.enabled {
        log::info!("   ✓ Challenge detection enabled");
    }

    PassageServer::bind(config).await?.serve().await?;
    log::info!("👋 Passage stopped");
    Ok(())
}
