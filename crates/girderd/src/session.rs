//! Session wiring: reactor → framer → dispatcher → documents.
//!
//! A [`Session`] owns one input descriptor and one output sink for its
//! whole lifetime. The reactor watches the descriptor; on readability
//! the framer performs its single bounded read and hands each complete
//! body to the dispatcher, whose responses are LSP-framed onto the
//! output before control returns to the loop. When the stream is
//! quiescent, an idle callback publishes diagnostics for every document
//! that changed since the previous pass.

use std::cell::{Cell, RefCell};
use std::io::{self, Write};
use std::os::fd::{AsRawFd, OwnedFd};
use std::rc::Rc;
use std::time::Duration;

use girder_config::RuntimeConfig;
use girder_protocol::{HandlerError, MessageFramer, NotificationSender, RpcDispatcher};
use girder_reactor::{HandlerOutcome, Reactor, ReactorError};
use girder_text::{Document, DocumentCollection};
use lsp_types::{Diagnostic, PublishDiagnosticsParams, Uri};
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::shutdown::ShutdownFlag;
use crate::statistics::format_statistics;

pub(crate) const SESSION_TARGET: &str = "girder::session";

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum SessionOutcome {
    /// End of stream, a `shutdown`/`exit` exchange, or a termination
    /// signal.
    CleanShutdown,
    /// A framing or read failure terminated the loop.
    StreamFailure,
}

/// Errors raised while starting a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The input descriptor could not be registered with the reactor.
    #[error("failed to register the input descriptor: {0}")]
    Registration(#[from] ReactorError),
}

/// A wired-up server session over one byte-stream pair.
///
/// Lifecycle handlers (`shutdown`, `exit`) and the four text-sync
/// notifications are registered at construction; applications add their
/// own request and notification handlers before calling
/// [`Session::run`].
pub struct Session {
    reactor: Reactor,
    framer: Rc<RefCell<MessageFramer>>,
    dispatcher: Rc<RefCell<RpcDispatcher>>,
    documents: Rc<RefCell<DocumentCollection>>,
    shutdown: ShutdownFlag,
    input: OwnedFd,
    failed: Rc<Cell<bool>>,
}

impl Session {
    /// Wires a session reading from `input` and writing LSP-framed
    /// responses to `output`.
    pub fn new<W>(
        config: &RuntimeConfig,
        input: OwnedFd,
        output: W,
        shutdown: ShutdownFlag,
    ) -> Self
    where
        W: Write + 'static,
    {
        let output: Rc<RefCell<Box<dyn Write>>> = Rc::new(RefCell::new(Box::new(output)));
        let sink = Rc::clone(&output);
        let dispatcher = Rc::new(RefCell::new(RpcDispatcher::new(move |reply| {
            if let Err(write_error) = write_framed(&mut *sink.borrow_mut(), reply.as_bytes()) {
                warn!(
                    target: SESSION_TARGET,
                    error = %write_error,
                    "failed to write response"
                );
            }
        })));

        let framer = Rc::new(RefCell::new(MessageFramer::with_compat(
            config.read_buffer_capacity(),
            config.header_compat(),
        )));
        let body_dispatcher = Rc::clone(&dispatcher);
        framer.borrow_mut().set_processor(move |_header, body| {
            body_dispatcher.borrow_mut().dispatch(body);
        });

        let documents = Rc::new(RefCell::new(DocumentCollection::with_encoding(
            config.position_encoding(),
        )));
        DocumentCollection::subscribe(&mut dispatcher.borrow_mut(), &documents);

        let flag = shutdown.clone();
        dispatcher
            .borrow_mut()
            .add_request_handler("shutdown", move |_params| {
                info!(target: SESSION_TARGET, "shutdown requested");
                flag.request();
                Ok(Value::Null)
            });
        let flag = shutdown.clone();
        dispatcher
            .borrow_mut()
            .add_notification_handler("exit", move |_params| {
                flag.request();
                Ok(())
            });

        Self {
            reactor: Reactor::new(Duration::from_millis(config.idle_interval_ms())),
            framer,
            dispatcher,
            documents,
            shutdown,
            input,
            failed: Rc::new(Cell::new(false)),
        }
    }

    /// Registers an application request handler.
    pub fn add_request_handler<H>(&mut self, method: impl Into<String>, handler: H)
    where
        H: FnMut(Value) -> Result<Value, HandlerError> + 'static,
    {
        self.dispatcher
            .borrow_mut()
            .add_request_handler(method, handler);
    }

    /// Registers an application notification handler.
    pub fn add_notification_handler<H>(&mut self, method: impl Into<String>, handler: H)
    where
        H: FnMut(Value) -> Result<(), HandlerError> + 'static,
    {
        self.dispatcher
            .borrow_mut()
            .add_notification_handler(method, handler);
    }

    /// Installs the idle diagnostics pass.
    ///
    /// Whenever the loop idles, `provider` runs for every document that
    /// changed since the previous pass and its result is published as a
    /// `textDocument/publishDiagnostics` notification.
    pub fn set_diagnostics_provider<P>(&mut self, mut provider: P)
    where
        P: FnMut(&str, &Document) -> Vec<Diagnostic> + 'static,
    {
        let documents = Rc::clone(&self.documents);
        let dispatcher = Rc::clone(&self.dispatcher);
        let mut last_published = 0u64;
        self.reactor.on_idle(move || {
            let documents = documents.borrow();
            let current = documents.global_version();
            if current == last_published {
                return HandlerOutcome::Keep;
            }
            documents.map_changed_since(last_published, |uri, document| {
                let diagnostics = provider(uri, document);
                publish_diagnostics(&mut dispatcher.borrow_mut(), uri, diagnostics);
            });
            last_published = current;
            HandlerOutcome::Keep
        });
    }

    /// Shared handle to the open-document collection.
    #[must_use]
    pub fn documents(&self) -> Rc<RefCell<DocumentCollection>> {
        Rc::clone(&self.documents)
    }

    /// Handle for queueing server-initiated notifications from inside
    /// request and notification handlers.
    #[must_use]
    pub fn notification_sender(&self) -> NotificationSender {
        self.dispatcher.borrow().notification_sender()
    }

    /// Drives the loop until the stream ends, shutdown is requested, or
    /// a stream failure occurs, then reports the session statistics on
    /// stderr.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Registration`] when the input descriptor
    /// cannot be registered.
    pub fn run(self) -> Result<SessionOutcome, SessionError> {
        let Self {
            mut reactor,
            framer,
            dispatcher,
            documents: _,
            shutdown,
            input,
            failed,
        } = self;

        let raw_fd = input.as_raw_fd();
        let pull_framer = Rc::clone(&framer);
        let reader_failed = Rc::clone(&failed);
        reactor.on_readable(raw_fd, move || {
            if shutdown.requested() {
                info!(target: SESSION_TARGET, "shutdown flag set, leaving the loop");
                return HandlerOutcome::Deregister;
            }
            let result = pull_framer
                .borrow_mut()
                .pull(|buffer| nix::unistd::read(&input, buffer).map_err(io::Error::from));
            match result {
                Ok(()) if shutdown.requested() => {
                    info!(target: SESSION_TARGET, "shutdown requested, leaving the loop");
                    HandlerOutcome::Deregister
                }
                Ok(()) => HandlerOutcome::Keep,
                Err(terminal) if terminal.is_clean_eof() => {
                    info!(target: SESSION_TARGET, "input stream closed");
                    HandlerOutcome::Deregister
                }
                Err(failure) => {
                    error!(target: SESSION_TARGET, error = %failure, "stream failure");
                    reader_failed.set(true);
                    HandlerOutcome::Deregister
                }
            }
        })?;

        reactor.run();

        let framer = framer.borrow();
        let dispatcher = dispatcher.borrow();
        let table = format_statistics(
            framer.total_bytes_read(),
            framer.largest_body_seen(),
            dispatcher.stats(),
        );
        eprint!("{table}");

        Ok(if failed.get() {
            SessionOutcome::StreamFailure
        } else {
            SessionOutcome::CleanShutdown
        })
    }
}

/// Writes one LSP-framed message: a `Content-Length` header followed by
/// the payload, flushed so the editor sees whole messages.
fn write_framed<W: Write>(mut writer: W, message: &[u8]) -> io::Result<()> {
    let header = format!("Content-Length: {}\r\n\r\n", message.len());
    writer.write_all(header.as_bytes())?;
    writer.write_all(message)?;
    writer.flush()
}

fn publish_diagnostics(dispatcher: &mut RpcDispatcher, uri: &str, diagnostics: Vec<Diagnostic>) {
    let parsed: Uri = match uri.parse() {
        Ok(parsed) => parsed,
        Err(parse_error) => {
            warn!(
                target: SESSION_TARGET,
                uri = %uri,
                error = ?parse_error,
                "cannot publish diagnostics for unparseable URI"
            );
            return;
        }
    };
    let params = PublishDiagnosticsParams {
        uri: parsed,
        diagnostics,
        version: None,
    };
    match serde_json::to_value(params) {
        Ok(value) => dispatcher.send_notification("textDocument/publishDiagnostics", value),
        Err(serialise_error) => warn!(
            target: SESSION_TARGET,
            error = %serialise_error,
            "failed to serialise diagnostics"
        ),
    }
}
