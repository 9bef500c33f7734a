//! Logging initialisation.
//!
//! Every crate in the workspace emits `tracing` events; this module installs
//! the global subscriber that renders them. `RUST_LOG`, when set, takes
//! precedence over [`LoggingSettings::level`].
//!
//! With `json = true` each event is written as one JSON object per line:
//!
//! ```json
//! {"timestamp":"2026-01-15T10:30:00.000Z","level":"WARN","target":"orgservice::batch::manager","fields":{"message":"batch is full"}}
//! ```

use thiserror::Error;
use tracing_subscriber::{filter::ParseError, fmt, prelude::*, util::TryInitError, EnvFilter};

use crate::config::LoggingSettings;

/// Errors raised while installing the global subscriber.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The configured level is not a valid filter directive.
    #[error("invalid log filter directive: {0}")]
    InvalidFilter(#[from] ParseError),

    /// A global subscriber was installed earlier in this process.
    #[error("a global tracing subscriber is already installed: {0}")]
    AlreadyInitialised(#[from] TryInitError),
}

/// Installs the global `tracing` subscriber.
///
/// Fails if the configured level is not a valid filter directive or if a
/// subscriber has already been installed in this process.
pub fn init_logging(settings: &LoggingSettings) -> Result<(), TelemetryError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => build_filter(&settings.level)?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    if settings.json {
        registry
            .with(fmt::layer().json().with_current_span(true))
            .try_init()?;
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()?;
    }

    tracing::debug!(level = %settings.level, json = settings.json, "logging initialised");
    Ok(())
}

fn build_filter(level: &str) -> Result<EnvFilter, TelemetryError> {
    Ok(EnvFilter::try_new(level)?)
}
