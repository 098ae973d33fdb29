use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

use crate::config::TelemetryConfig;

/// Raised when the tracing stack cannot be stood up.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("log filter '{filter}' does not parse")]
    InvalidFilter {
        filter: String,
        #[source]
        source: ParseError,
    },
    #[error("tracing subscriber could not be installed: {0}")]
    Install(Box<dyn std::error::Error + Send + Sync>),
}

/// Install the process-wide subscriber: compact single-line output, no ANSI
/// color, level taken from `RUST_LOG` when set and the configured default
/// otherwise.
pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = resolve_filter(config)?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .compact()
        .try_init()
        .map_err(TelemetryError::Install)
}

fn resolve_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    let directive =
        std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_else(|_| config.log_level.clone());
    parse_filter(&directive)
}

fn parse_filter(directive: &str) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(directive).map_err(|source| TelemetryError::InvalidFilter {
        filter: directive.to_string(),
        source,
    })
}
