//! Telemetry bootstrap for the server binary.
//!
//! Protocol frames own stdout, so every tracing event is written to
//! stderr. The subscriber is installed once per process: the first
//! [`initialise`] call wins and later calls return without touching
//! global state, which lets embedders and test harnesses call it
//! unconditionally.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use girder_config::RuntimeConfig;

static INSTALLED: OnceCell<()> = OnceCell::new();

/// Errors raised while installing the tracing subscriber.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The configured filter expression did not parse.
    #[error("invalid log filter '{filter}': {reason}")]
    BadFilter {
        /// The rejected filter expression.
        filter: String,
        /// Why the expression was rejected.
        reason: String,
    },
    /// A global subscriber was already installed outside this module.
    #[error("a tracing subscriber is already installed: {0}")]
    AlreadyInstalled(String),
}

/// Installs the stderr tracing subscriber described by `config`.
///
/// Only the first call installs anything; repeated calls are no-ops
/// returning `Ok(())`. A failed call leaves no marker behind, so the
/// caller may fix its configuration and try again.
///
/// # Errors
///
/// Returns [`TelemetryError::BadFilter`] when the filter expression is
/// invalid and [`TelemetryError::AlreadyInstalled`] when some other
/// code claimed the global subscriber first.
pub fn initialise(config: &RuntimeConfig) -> Result<(), TelemetryError> {
    if INSTALLED.get().is_some() {
        return Ok(());
    }

    let filter =
        EnvFilter::try_new(config.log_filter()).map_err(|parse_error| TelemetryError::BadFilter {
            filter: config.log_filter().to_string(),
            reason: parse_error.to_string(),
        })?;

    // Colour only when a person is actually looking at stderr.
    let stderr_is_tty = io::stderr().is_terminal();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(stderr_is_tty);

    let outcome = if config.log_format().is_json() {
        subscriber.json().flatten_event(true).try_init()
    } else {
        subscriber.compact().try_init()
    };
    outcome.map_err(|install_error| TelemetryError::AlreadyInstalled(install_error.to_string()))?;

    let _ = INSTALLED.set(());
    Ok(())
}
