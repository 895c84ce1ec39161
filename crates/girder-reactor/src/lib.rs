//! Single-threaded readiness multiplexer.
#![deny(missing_docs)]
//!
//! The [`Reactor`] watches a set of file descriptors for readability and
//! invokes idle handlers when nothing became ready within the configured
//! interval. Everything runs on the caller's thread; handlers deregister
//! themselves through their return value, so the loop terminates exactly
//! when the last readable handler leaves. This is the only place the
//! scaffolding suspends, which keeps framing, dispatch, and document
//! mutation strictly serialised.

mod errors;
mod reactor;

pub use errors::ReactorError;
pub use reactor::{CycleStep, HandlerOutcome, Reactor};
