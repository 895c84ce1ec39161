//! URI-keyed collection of open documents.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use girder_config::PositionEncoding;
use girder_protocol::{HandlerError, RpcDispatcher};
use lsp_types::{
    DidChangeTextDocumentParams, DidCloseTextDocumentParams, DidOpenTextDocumentParams,
    DidSaveTextDocumentParams,
};
use serde_json::Value;
use tracing::{debug, info};

use crate::document::Document;

pub(crate) const TEXT_TARGET: &str = "girder::text";

/// Owns every open document and tracks a monotonically increasing
/// global edit version.
///
/// Each accepted change stamps its document with a freshly allocated
/// version, so idle consumers can ask "what changed since version V?"
/// through [`DocumentCollection::map_changed_since`] without scanning
/// content.
#[derive(Debug, Default)]
pub struct DocumentCollection {
    documents: HashMap<String, Document>,
    global_version: u64,
    encoding: PositionEncoding,
}

impl DocumentCollection {
    /// Builds an empty collection using byte-offset position columns.
    #[must_use]
    pub fn new() -> Self {
        Self::with_encoding(PositionEncoding::default())
    }

    /// Builds an empty collection with an explicit position column unit.
    #[must_use]
    pub fn with_encoding(encoding: PositionEncoding) -> Self {
        Self {
            documents: HashMap::new(),
            global_version: 0,
            encoding,
        }
    }

    /// Registers the four text-sync notification handlers on the
    /// dispatcher, forwarding events to the shared collection.
    pub fn subscribe(dispatcher: &mut RpcDispatcher, collection: &Rc<RefCell<Self>>) {
        let documents = Rc::clone(collection);
        dispatcher.add_notification_handler("textDocument/didOpen", move |params| {
            documents.borrow_mut().did_open(parse_params(params)?);
            Ok(())
        });

        let documents = Rc::clone(collection);
        dispatcher.add_notification_handler("textDocument/didChange", move |params| {
            documents.borrow_mut().did_change(&parse_params(params)?);
            Ok(())
        });

        let documents = Rc::clone(collection);
        dispatcher.add_notification_handler("textDocument/didClose", move |params| {
            documents.borrow_mut().did_close(&parse_params(params)?);
            Ok(())
        });

        let documents = Rc::clone(collection);
        dispatcher.add_notification_handler("textDocument/didSave", move |params| {
            documents.borrow_mut().did_save(&parse_params(params)?);
            Ok(())
        });
    }

    /// Handles `textDocument/didOpen`; a second open of the same URI is
    /// ignored.
    pub fn did_open(&mut self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri.as_str().to_owned();
        if self.documents.contains_key(&uri) {
            debug!(target: TEXT_TARGET, uri = %uri, "ignoring duplicate open");
            return;
        }
        info!(target: TEXT_TARGET, uri = %uri, "open");
        let mut document = Document::with_encoding(&params.text_document.text, self.encoding);
        self.global_version += 1;
        document.stamp_global_version(self.global_version);
        self.documents.insert(uri, document);
    }

    /// Handles `textDocument/didChange`, applying each change in order.
    ///
    /// Rejected changes do not abort the sequence; edits for an unknown
    /// URI are ignored.
    pub fn did_change(&mut self, params: &DidChangeTextDocumentParams) {
        let uri = params.text_document.uri.as_str();
        let Some(document) = self.documents.get_mut(uri) else {
            debug!(target: TEXT_TARGET, uri = %uri, "change for unknown document");
            return;
        };
        for change in &params.content_changes {
            if document.apply_change(change) {
                self.global_version += 1;
                document.stamp_global_version(self.global_version);
            } else {
                debug!(target: TEXT_TARGET, uri = %uri, "rejected change");
            }
        }
    }

    /// Handles `textDocument/didClose`; subsequent edits for the URI are
    /// silently ignored.
    pub fn did_close(&mut self, params: &DidCloseTextDocumentParams) {
        let uri = params.text_document.uri.as_str();
        if self.documents.remove(uri).is_some() {
            info!(target: TEXT_TARGET, uri = %uri, "close");
        }
    }

    /// Handles `textDocument/didSave`; currently a no-op on state.
    pub fn did_save(&mut self, _params: &DidSaveTextDocumentParams) {}

    /// Looks up an open document by URI.
    #[must_use]
    pub fn find(&self, uri: &str) -> Option<&Document> {
        self.documents.get(uri)
    }

    /// Number of currently open documents.
    #[must_use]
    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// The version allocated to the most recent mutation.
    #[must_use]
    pub fn global_version(&self) -> u64 {
        self.global_version
    }

    /// Invokes `processor` for every document stamped after `version`,
    /// in arbitrary order.
    pub fn map_changed_since<F>(&self, version: u64, mut processor: F)
    where
        F: FnMut(&str, &Document),
    {
        for (uri, document) in &self.documents {
            if document.last_global_version() > version {
                processor(uri, document);
            }
        }
    }
}

fn parse_params<P: serde::de::DeserializeOwned>(params: Value) -> Result<P, HandlerError> {
    serde_json::from_value(params)
        .map_err(|error| HandlerError::with_source("malformed text-sync params", error))
}

#[cfg(test)]
mod tests {
    use lsp_types::{
        Position, Range, TextDocumentContentChangeEvent, TextDocumentIdentifier,
        TextDocumentItem, Uri, VersionedTextDocumentIdentifier,
    };
    use rstest::{fixture, rstest};

    use super::*;

    fn uri(text: &str) -> Uri {
        text.parse().expect("test URI should parse")
    }

    fn open_params(uri_text: &str, text: &str) -> DidOpenTextDocumentParams {
        DidOpenTextDocumentParams {
            text_document: TextDocumentItem {
                uri: uri(uri_text),
                language_id: "plaintext".to_string(),
                version: 1,
                text: text.to_string(),
            },
        }
    }

    fn change_params(
        uri_text: &str,
        changes: Vec<TextDocumentContentChangeEvent>,
    ) -> DidChangeTextDocumentParams {
        DidChangeTextDocumentParams {
            text_document: VersionedTextDocumentIdentifier {
                uri: uri(uri_text),
                version: 2,
            },
            content_changes: changes,
        }
    }

    fn replacement(start: (u32, u32), end: (u32, u32), text: &str) -> TextDocumentContentChangeEvent {
        TextDocumentContentChangeEvent {
            range: Some(Range {
                start: Position {
                    line: start.0,
                    character: start.1,
                },
                end: Position {
                    line: end.0,
                    character: end.1,
                },
            }),
            range_length: None,
            text: text.to_string(),
        }
    }

    #[fixture]
    fn collection() -> DocumentCollection {
        let mut collection = DocumentCollection::new();
        collection.did_open(open_params("file:///demo.txt", "Hello World\n"));
        collection
    }

    #[rstest]
    fn open_makes_the_document_findable(collection: DocumentCollection) {
        let document = collection
            .find("file:///demo.txt")
            .expect("document should be open");

        document.request_content(|text| assert_eq!(text, "Hello World\n"));
        assert_eq!(collection.global_version(), 1);
    }

    #[rstest]
    fn duplicate_open_is_ignored(mut collection: DocumentCollection) {
        collection.did_open(open_params("file:///demo.txt", "other content"));

        let document = collection
            .find("file:///demo.txt")
            .expect("document should stay open");
        document.request_content(|text| assert_eq!(text, "Hello World\n"));
        assert_eq!(collection.document_count(), 1);
    }

    #[rstest]
    fn change_applies_and_stamps_a_version(mut collection: DocumentCollection) {
        collection.did_change(&change_params(
            "file:///demo.txt",
            vec![replacement((0, 6), (0, 11), "Planet")],
        ));

        let document = collection
            .find("file:///demo.txt")
            .expect("document should be open");
        document.request_content(|text| assert_eq!(text, "Hello Planet\n"));
        assert_eq!(document.edit_count(), 1);
        assert_eq!(document.last_global_version(), 2);
        assert_eq!(collection.global_version(), 2);
    }

    #[rstest]
    fn rejected_changes_do_not_abort_the_sequence(mut collection: DocumentCollection) {
        collection.did_change(&change_params(
            "file:///demo.txt",
            vec![
                replacement((0, 99), (0, 100), "x"),
                replacement((0, 0), (0, 5), "Howdy"),
            ],
        ));

        let document = collection
            .find("file:///demo.txt")
            .expect("document should be open");
        document.request_content(|text| assert_eq!(text, "Howdy World\n"));
        assert_eq!(document.edit_count(), 1);
        assert_eq!(collection.global_version(), 2);
    }

    #[rstest]
    fn change_for_unknown_uri_is_ignored(mut collection: DocumentCollection) {
        collection.did_change(&change_params(
            "file:///other.txt",
            vec![replacement((0, 0), (0, 1), "x")],
        ));

        assert_eq!(collection.global_version(), 1);
    }

    #[rstest]
    fn close_removes_the_document(mut collection: DocumentCollection) {
        collection.did_close(&DidCloseTextDocumentParams {
            text_document: TextDocumentIdentifier {
                uri: uri("file:///demo.txt"),
            },
        });

        assert!(collection.find("file:///demo.txt").is_none());
        assert_eq!(collection.document_count(), 0);
    }

    #[rstest]
    fn map_changed_since_filters_by_version(mut collection: DocumentCollection) {
        collection.did_open(open_params("file:///second.txt", "two\n"));
        let baseline = collection.global_version();
        collection.did_change(&change_params(
            "file:///second.txt",
            vec![replacement((0, 0), (0, 3), "TWO")],
        ));

        let mut changed = Vec::new();
        collection.map_changed_since(baseline, |uri, _document| changed.push(uri.to_owned()));

        assert_eq!(changed, vec!["file:///second.txt".to_owned()]);
    }

    #[rstest]
    fn subscribe_routes_notifications_through_the_dispatcher() {
        let mut dispatcher = RpcDispatcher::new(|_| {});
        let collection = Rc::new(RefCell::new(DocumentCollection::new()));
        DocumentCollection::subscribe(&mut dispatcher, &collection);

        dispatcher.dispatch(
            br#"{"jsonrpc":"2.0","method":"textDocument/didOpen","params":{"textDocument":{"uri":"file:///demo.txt","languageId":"plaintext","version":1,"text":"Hello World\n"}}}"#,
        );
        dispatcher.dispatch(
            br#"{"jsonrpc":"2.0","method":"textDocument/didChange","params":{"textDocument":{"uri":"file:///demo.txt","version":2},"contentChanges":[{"range":{"start":{"line":0,"character":6},"end":{"line":0,"character":11}},"text":"Planet"}]}}"#,
        );

        let documents = collection.borrow();
        let document = documents
            .find("file:///demo.txt")
            .expect("document should be open");
        document.request_content(|text| assert_eq!(text, "Hello Planet\n"));
        assert_eq!(dispatcher.stats().get("textDocument/didOpen  ev"), Some(&1));
        assert_eq!(
            dispatcher.stats().get("textDocument/didChange  ev"),
            Some(&1)
        );
    }

    #[rstest]
    fn malformed_text_sync_params_are_counted_not_fatal() {
        let mut dispatcher = RpcDispatcher::new(|_| {});
        let collection = Rc::new(RefCell::new(DocumentCollection::new()));
        DocumentCollection::subscribe(&mut dispatcher, &collection);

        dispatcher.dispatch(
            br#"{"jsonrpc":"2.0","method":"textDocument/didOpen","params":{"wrong":"shape"}}"#,
        );

        assert_eq!(collection.borrow().document_count(), 0);
        assert_eq!(
            dispatcher
                .stats()
                .get("textDocument/didOpen : malformed text-sync params"),
            Some(&1)
        );
    }
}
