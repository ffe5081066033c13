use tracing_subscriber::EnvFilter;

use crate::config::EngineConfig;

/// Initializes the global tracing subscriber from engine configuration.
///
/// `RUST_LOG` takes precedence over the configured level. Returns `false`
/// when a subscriber was already installed (common under `cargo test`),
/// which callers may ignore.
pub fn init_tracing(config: &EngineConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let result = if config.log_json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    result.is_ok()
}
