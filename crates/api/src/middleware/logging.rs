//! Logging initialization.

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::LoggingConfig;

/// Builds the filter: `RUST_LOG` wins over the configured level.
fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
}

/// Installs the global subscriber. `format = "json"` emits one JSON object
/// per event; anything else uses the human-readable formatter.
///
/// Returns an error if a subscriber is already installed.
pub fn init_logging(
    config: &LoggingConfig,
) -> Result<(), tracing_subscriber::util::TryInitError> {
    let subscriber = tracing_subscriber::registry().with(env_filter(config));

    if config.format == "json" {
        subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_span_events(FmtSpan::CLOSE)
                    .with_current_span(true)
                    .with_target(true),
            )
            .try_init()
    } else {
        subscriber
            .with(fmt::layer().pretty().with_target(true))
            .try_init()
    }
}
