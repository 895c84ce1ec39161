//! Error types for reactor registration.

use std::os::fd::RawFd;

use thiserror::Error;

/// Errors raised while registering handlers with the reactor.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReactorError {
    /// The file descriptor already has a readable handler.
    #[error("file descriptor {fd} is already registered")]
    AlreadyRegistered {
        /// The rejected file descriptor.
        fd: RawFd,
    },
}
