//! Process-wide shutdown flag.
//!
//! The one legitimate piece of global state in the scaffold: a single
//! atomic set either by a termination signal or by the protocol's
//! `shutdown`/`exit` lifecycle methods, and observed by the input
//! reader, which deregisters itself to end the loop. Signal handlers
//! only ever store into the atomic, keeping them async-signal-safe.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use signal_hook::consts::signal::{SIGINT, SIGTERM};
use thiserror::Error;

/// Errors raised while installing the shutdown signal handlers.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Registering a signal handler failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Shared flag indicating the session should wind down.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag {
    flag: Arc<AtomicBool>,
}

impl ShutdownFlag {
    /// Builds a flag wired to `SIGINT` and `SIGTERM`.
    ///
    /// # Errors
    ///
    /// Returns [`ShutdownError::Install`] when handler registration
    /// fails.
    pub fn install() -> Result<Self, ShutdownError> {
        let shutdown = Self::detached();
        for signal in [SIGINT, SIGTERM] {
            signal_hook::flag::register(signal, Arc::clone(&shutdown.flag))
                .map_err(|source| ShutdownError::Install { source })?;
        }
        Ok(shutdown)
    }

    /// Builds a flag with no signal wiring, for tests and embedders
    /// that manage signals themselves.
    #[must_use]
    pub fn detached() -> Self {
        Self::default()
    }

    /// Requests shutdown.
    pub fn request(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether shutdown has been requested.
    #[must_use]
    pub fn requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
