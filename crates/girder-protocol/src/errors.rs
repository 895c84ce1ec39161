//! Error types for the protocol layer.

use std::error::Error;
use std::io;

use thiserror::Error;

/// Errors reported by [`crate::MessageFramer::pull`].
#[derive(Debug, Error)]
pub enum FramerError {
    /// `pull` was invoked before a message processor was installed.
    #[error("no message processor installed")]
    ProcessorMissing,

    /// The stream ended cleanly with no partial message pending.
    ///
    /// This is the expected terminal status of a well-behaved session,
    /// not a fault.
    #[error("end of stream")]
    Eof,

    /// The stream ended while a partial message was still buffered.
    #[error("end of stream with {pending} unparsed bytes pending")]
    TruncatedMessage {
        /// Number of buffered bytes that never completed a message.
        pending: usize,
    },

    /// A complete header block carried no parseable `Content-Length`.
    #[error("missing or malformed Content-Length header in '{preview}...'")]
    MalformedHeader {
        /// At most 256 bytes of the offending prefix, lossily decoded.
        preview: String,
    },

    /// The read function failed with no partial message pending.
    #[error("read failed: {0}")]
    Read(#[from] io::Error),
}

impl FramerError {
    /// Whether this status terminates a session without indicating a
    /// fault (clean end-of-stream).
    #[must_use]
    pub fn is_clean_eof(&self) -> bool {
        matches!(self, Self::Eof)
    }
}

/// Errors returned by request and notification handlers.
///
/// The dispatcher reports the display form back to the client as the
/// `-32603` internal error detail and folds it into the statistics map.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
    #[source]
    source: Option<Box<dyn Error + Send + Sync>>,
}

impl HandlerError {
    /// Builds an error without an underlying source.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Builds an error that wraps an underlying source.
    #[must_use]
    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn Error + Send + Sync>>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Human-friendly description without the optional source.
    #[must_use]
    pub fn message(&self) -> &str {
        self.message.as_str()
    }
}
