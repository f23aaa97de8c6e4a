//! # Logging
//!
//! tracing subscriber setup for the CLI. `RUST_LOG` takes precedence over the
//! configured level; logs go to stderr so command output stays on stdout.

use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, RuntimeConfig};

/// Install the global subscriber
///
/// Does nothing if a subscriber is already installed (tests, embedding).
pub fn init_logging(config: &RuntimeConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("envzip={}", config.log_level).into());

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let _ = match config.log_format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };
}
