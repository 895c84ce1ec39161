//! JSON-RPC 2.0 message dispatch.
//!
//! The dispatcher is fed one message body at a time, parses it, and
//! routes the contained method call to a pre-registered handler.
//! Request results and faults are wrapped in response objects and handed
//! to the write function; notifications never produce output. Receiving
//! and writing are both abstracted away, keeping the dispatcher agnostic
//! of the transport layer.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::rc::Rc;

use serde_json::{Value, json};
use tracing::warn;

use crate::errors::HandlerError;

pub(crate) const DISPATCH_TARGET: &str = "girder::dispatch";

/// JSON-RPC error code for an unparseable message.
pub const PARSE_ERROR: i64 = -32700;
/// JSON-RPC error code for an unknown or absent method.
pub const METHOD_NOT_FOUND: i64 = -32601;
/// JSON-RPC error code for a handler fault.
pub const INTERNAL_ERROR: i64 = -32603;

/// Ordered method and fault counters kept by the dispatcher.
pub type StatsMap = BTreeMap<String, u64>;

type RequestHandler = Box<dyn FnMut(Value) -> Result<Value, HandlerError>>;
type NotificationHandler = Box<dyn FnMut(Value) -> Result<(), HandlerError>>;

/// Queues server-initiated notifications from inside handlers.
///
/// Handlers run while the dispatcher is busy with the current message,
/// so they cannot write directly. Queued notifications are flushed once
/// the message is fully handled, after the response (if any) of the
/// current request and before control returns to the event loop.
#[derive(Debug, Clone, Default)]
pub struct NotificationSender {
    queue: Rc<RefCell<VecDeque<(String, Value)>>>,
}

impl NotificationSender {
    /// Queues one notification for delivery after the current message.
    pub fn queue_notification(&self, method: impl Into<String>, params: Value) {
        self.queue
            .borrow_mut()
            .push_back((method.into(), params));
    }
}

/// Routes parsed JSON-RPC messages to registered handlers.
///
/// Every response is serialised as a single JSON document terminated by
/// a newline and handed to the write function in one invocation; the
/// writer owns transport framing.
pub struct RpcDispatcher {
    write_fn: Box<dyn FnMut(&str)>,
    request_handlers: HashMap<String, RequestHandler>,
    notification_handlers: HashMap<String, NotificationHandler>,
    outgoing: NotificationSender,
    stats: StatsMap,
}

impl RpcDispatcher {
    /// Builds a dispatcher writing responses through `write_fn`.
    pub fn new<W>(write_fn: W) -> Self
    where
        W: FnMut(&str) + 'static,
    {
        Self {
            write_fn: Box::new(write_fn),
            request_handlers: HashMap::new(),
            notification_handlers: HashMap::new(),
            outgoing: NotificationSender::default(),
            stats: StatsMap::new(),
        }
    }

    /// Handle for queueing notifications from inside handlers.
    #[must_use]
    pub fn notification_sender(&self) -> NotificationSender {
        self.outgoing.clone()
    }

    /// Registers a handler for RPC calls that return a response.
    ///
    /// A later registration for the same method replaces the earlier one.
    pub fn add_request_handler<H>(&mut self, method: impl Into<String>, handler: H)
    where
        H: FnMut(Value) -> Result<Value, HandlerError> + 'static,
    {
        self.request_handlers
            .insert(method.into(), Box::new(handler));
    }

    /// Registers a handler for receive-only notification events.
    ///
    /// A later registration for the same method replaces the earlier one.
    pub fn add_notification_handler<H>(&mut self, method: impl Into<String>, handler: H)
    where
        H: FnMut(Value) -> Result<(), HandlerError> + 'static,
    {
        self.notification_handlers
            .insert(method.into(), Box::new(handler));
    }

    /// Parses and routes exactly one message body.
    ///
    /// Requests produce exactly one response through the write function,
    /// successful or not. Notifications produce none: an unknown
    /// notification method is dropped silently and a notification
    /// handler fault is only counted.
    pub fn dispatch(&mut self, body: &[u8]) {
        let request: Value = match serde_json::from_slice(body) {
            Ok(value) => value,
            Err(error) => {
                let detail = error.to_string();
                self.bump(detail.clone());
                self.send_error(&Value::Null, PARSE_ERROR, &detail);
                return;
            }
        };

        let Some(method) = request
            .get("method")
            .and_then(Value::as_str)
            .map(str::to_owned)
        else {
            self.send_error(&request, METHOD_NOT_FOUND, "Method required in request");
            self.bump("Request without method");
            return;
        };

        let is_notification = request.get("id").is_none();
        let handled = if is_notification {
            self.call_notification(&request, &method)
        } else {
            self.call_request_handler(&request, &method)
        };

        let mut key = method;
        if !handled {
            key.push_str(" (unhandled)");
        }
        key.push_str(if is_notification { "  ev" } else { " RPC" });
        self.bump(key);
        self.flush_queued_notifications();
    }

    /// Emits a server-initiated notification through the write function.
    pub fn send_notification(&mut self, method: &str, params: Value) {
        self.send_reply(json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        }));
    }

    /// Snapshot of the method and fault counters.
    #[must_use]
    pub fn stats(&self) -> &StatsMap {
        &self.stats
    }

    fn call_notification(&mut self, request: &Value, method: &str) -> bool {
        let Some(handler) = self.notification_handlers.get_mut(method) else {
            return false;
        };
        let params = request.get("params").cloned().unwrap_or(Value::Null);
        let result = handler(params);
        match result {
            Ok(()) => true,
            Err(error) => {
                self.bump(format!("{method} : {error}"));
                false
            }
        }
    }

    fn call_request_handler(&mut self, request: &Value, method: &str) -> bool {
        if !self.request_handlers.contains_key(method) {
            self.send_error(
                request,
                METHOD_NOT_FOUND,
                &format!("method '{method}' not found."),
            );
            return false;
        }
        let params = request.get("params").cloned().unwrap_or(Value::Null);
        let result = self
            .request_handlers
            .get_mut(method)
            .expect("presence checked above")(params);
        match result {
            Ok(value) => {
                self.send_reply(json!({
                    "jsonrpc": "2.0",
                    "id": request.get("id").cloned().unwrap_or(Value::Null),
                    "result": value,
                }));
                true
            }
            Err(error) => {
                let detail = error.to_string();
                self.bump(format!("{method} : {detail}"));
                self.send_error(request, INTERNAL_ERROR, &detail);
                false
            }
        }
    }

    fn flush_queued_notifications(&mut self) {
        loop {
            let Some((method, params)) = self.outgoing.queue.borrow_mut().pop_front() else {
                break;
            };
            self.send_notification(&method, params);
        }
    }

    fn send_error(&mut self, request: &Value, code: i64, message: &str) {
        let mut error = json!({ "code": code });
        if !message.is_empty() {
            error["message"] = Value::from(message);
        }
        let mut response = json!({
            "jsonrpc": "2.0",
            "error": error,
        });
        if let Some(id) = request.get("id") {
            response["id"] = id.clone();
        }
        self.send_reply(response);
    }

    fn send_reply(&mut self, response: Value) {
        match serde_json::to_string(&response) {
            Ok(mut serialised) => {
                serialised.push('\n');
                (self.write_fn)(&serialised);
            }
            Err(error) => warn!(
                target: DISPATCH_TARGET,
                error = %error,
                "failed to serialise response"
            ),
        }
    }

    fn bump(&mut self, key: impl Into<String>) {
        *self.stats.entry(key.into()).or_insert(0) += 1;
    }
}
