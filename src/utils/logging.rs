//! Tracing subscriber setup.
//!
//! Logs always go to stderr so the report on stdout stays clean.

use super::toml_config::{LogFormat, LoggingConfig};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Pick the filter directive: `RUST_LOG` wins, then `--verbose`, then the config.
pub fn filter_directive(config: &LoggingConfig, verbose: bool) -> String {
    if let Ok(env) = std::env::var("RUST_LOG") {
        if !env.trim().is_empty() {
            return env;
        }
    }
    if verbose {
        "deepsearch=debug,info".to_string()
    } else {
        config.level.clone()
    }
}

/// Install the global subscriber. A second call is a no-op.
pub fn init_logging(config: &LoggingConfig, verbose: bool, json: bool) {
    let filter = EnvFilter::try_new(filter_directive(config, verbose))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let json = json || config.format == LogFormat::Json;

    let pretty_layer = (!json).then(|| fmt::layer().with_writer(std::io::stderr).with_target(false));
    let json_layer = json.then(|| fmt::layer().json().with_writer(std::io::stderr));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(pretty_layer)
        .with(json_layer)
        .try_init();
}
