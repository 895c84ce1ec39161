//! Stdio server scaffold for Language Server Protocol applications.
#![deny(missing_docs)]
//!
//! The crate wires the scaffolding together: the reactor watches the
//! input descriptor, the framer re-assembles protocol messages from it,
//! the dispatcher routes each body to handlers, and the document
//! collection mirrors the editor's open files. Applications register
//! their request handlers and a diagnostics provider on a [`Session`]
//! and call [`Session::run`]; lifecycle methods, shutdown signals,
//! response framing, idle diagnostics publishing, and the final
//! statistics report are provided here.

mod session;
mod shutdown;
mod statistics;
pub mod telemetry;

pub use session::{Session, SessionError, SessionOutcome};
pub use shutdown::{ShutdownError, ShutdownFlag};

#[cfg(test)]
mod tests;
