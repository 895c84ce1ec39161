//! Stream framing and JSON-RPC 2.0 dispatch.
#![deny(missing_docs)]
//!
//! Two halves of the protocol layer live here. [`MessageFramer`]
//! re-assembles discrete `Content-Length`-framed messages from a byte
//! stream handed to it one bounded read at a time, which lets it sit
//! directly inside a readiness callback. [`RpcDispatcher`] parses each
//! message body, routes it to a registered request or notification
//! handler, and wraps results and faults into protocol-conformant
//! responses while keeping per-method statistics. Both are transport
//! agnostic: the framer is fed a read function and the dispatcher writes
//! through a caller-supplied sink.

mod dispatch;
mod errors;
mod framing;

pub use dispatch::{
    INTERNAL_ERROR, METHOD_NOT_FOUND, NotificationSender, PARSE_ERROR, RpcDispatcher, StatsMap,
};
pub use errors::{FramerError, HandlerError};
pub use framing::MessageFramer;
