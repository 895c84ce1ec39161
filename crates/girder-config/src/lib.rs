//! Runtime configuration for the girder scaffolding.
#![deny(missing_docs)]
//!
//! The scaffolding crates share one [`RuntimeConfig`] value resolved at
//! process start: buffer sizing for the stream framer, the reactor's idle
//! interval, logging filter and format, and the protocol compatibility
//! knobs. Values come from built-in defaults overridden by `GIRDER_*`
//! environment variables; invalid overrides fail fast so a misconfigured
//! server never starts half-working.

mod compat;
pub mod defaults;
mod logging;
mod runtime;

pub use compat::{HeaderCompat, PositionEncoding};
pub use logging::LogFormat;
pub use runtime::{
    ConfigError, ENV_HEADER_COMPAT, ENV_IDLE_INTERVAL_MS, ENV_LOG_FILTER, ENV_LOG_FORMAT,
    ENV_POSITION_ENCODING, ENV_READ_BUFFER_CAPACITY, RuntimeConfig,
};
