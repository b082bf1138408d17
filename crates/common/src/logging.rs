//! Tracing subscriber setup.

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{ReframeError, ReframeResult};

/// Level filter: `RUST_LOG` when set, otherwise the configured directives.
pub fn build_filter(config: &LoggingConfig) -> ReframeResult<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level)
        .map_err(|e| ReframeError::config(format!("Invalid log filter '{}': {e}", config.level)))
}

/// Install the global subscriber. All output goes to stderr.
///
/// Fails on an unparsable filter or when a subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> ReframeResult<()> {
    let filter = build_filter(config)?;

    let installed = if config.json {
        fmt()
            .with_env_filter(filter)
            .json()
            .with_writer(std::io::stderr)
            .try_init()
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(false)
            .with_writer(std::io::stderr)
            .try_init()
    };

    installed.map_err(|e| ReframeError::config(format!("Failed to install logger: {e}")))
}
