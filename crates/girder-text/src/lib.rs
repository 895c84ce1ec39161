//! Incremental text-buffer model.
#![deny(missing_docs)]
//!
//! Tracks the editor's view of every open document as a line-addressed
//! structure. [`Document`] applies the text-sync protocol's single-line
//! and multi-line range edits with strict invariants (every line except
//! possibly the last ends in `\n`, byte length bookkeeping, monotonic
//! edit counting) and reconstructs a flat view on demand.
//! [`DocumentCollection`] owns the documents keyed by URI, subscribes to
//! the four text-sync notifications, and stamps each mutation with a
//! global version so idle consumers can discover what changed.

mod collection;
mod document;

pub use collection::DocumentCollection;
pub use document::Document;
