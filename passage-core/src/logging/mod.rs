//! Logger bootstrap
//!
//! Diagnostics go through the standard `log` macros everywhere; this module
//! only installs `env_logger` once at startup. `RUST_LOG` overrides the
//! configured level.

use crate::config::LoggingConfig;

/// Install the global logger. Calling it again is a no-op.
pub fn init_logging(config: &LoggingConfig) {
    let env = env_logger::Env::default().default_filter_or(config.level.as_str());
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .format_module_path(false)
        .try_init(); // try_init so tests and embedders can call it repeatedly
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_init_is_harmless() {
        let config = LoggingConfig::default();
        init_logging(&config);
        init_logging(&config);
        log::info!("logger ready");
    }
}
