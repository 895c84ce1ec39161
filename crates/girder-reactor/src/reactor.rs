//! Readiness loop over `poll(2)`.

use std::collections::BTreeMap;
use std::os::fd::{BorrowedFd, RawFd};
use std::time::Duration;

use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use tracing::warn;

use crate::errors::ReactorError;

pub(crate) const REACTOR_TARGET: &str = "girder::reactor";

/// Whether a handler wants to stay registered after an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum HandlerOutcome {
    /// Keep the handler registered for future cycles.
    Keep,
    /// Remove the handler; it will not be invoked again.
    Deregister,
}

/// Result of driving the loop for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum CycleStep {
    /// The cycle ran handlers (or idled) and the loop may continue.
    Continue,
    /// No readable handlers remain, or the wait primitive failed.
    Stop,
}

type Handler = Box<dyn FnMut() -> HandlerOutcome>;

/// Watches file descriptors for readability and runs idle work when the
/// stream is quiescent.
///
/// Handlers are plain callbacks owned by the reactor. Readable handlers
/// fire in ascending descriptor order, idle handlers in insertion order;
/// both deregister by returning [`HandlerOutcome::Deregister`]. The ready
/// set is snapshotted per cycle, so a handler leaving mid-cycle never
/// disturbs the iteration order of that cycle.
pub struct Reactor {
    idle_interval: Duration,
    read_handlers: BTreeMap<RawFd, Handler>,
    idle_handlers: Vec<Handler>,
}

impl Reactor {
    /// Builds a reactor that fires idle handlers after `idle_interval`
    /// without readable activity.
    #[must_use]
    pub fn new(idle_interval: Duration) -> Self {
        Self {
            idle_interval,
            read_handlers: BTreeMap::new(),
            idle_handlers: Vec::new(),
        }
    }

    /// Registers a handler invoked whenever `fd` becomes readable.
    ///
    /// The registrant guarantees the descriptor stays open for as long as
    /// the handler remains registered.
    ///
    /// # Errors
    ///
    /// Returns [`ReactorError::AlreadyRegistered`] when `fd` already has a
    /// handler.
    pub fn on_readable<H>(&mut self, fd: RawFd, handler: H) -> Result<(), ReactorError>
    where
        H: FnMut() -> HandlerOutcome + 'static,
    {
        if self.read_handlers.contains_key(&fd) {
            return Err(ReactorError::AlreadyRegistered { fd });
        }
        self.read_handlers.insert(fd, Box::new(handler));
        Ok(())
    }

    /// Appends a handler invoked when no descriptor became readable
    /// within the idle interval.
    pub fn on_idle<H>(&mut self, handler: H)
    where
        H: FnMut() -> HandlerOutcome + 'static,
    {
        self.idle_handlers.push(Box::new(handler));
    }

    /// Number of currently registered readable handlers.
    #[must_use]
    pub fn readable_count(&self) -> usize {
        self.read_handlers.len()
    }

    /// Drives [`Self::single_cycle`] until it reports [`CycleStep::Stop`].
    pub fn run(&mut self) {
        let interval = self.idle_interval;
        while self.single_cycle(interval) == CycleStep::Continue {}
    }

    /// Runs one wait-and-dispatch cycle.
    ///
    /// Exactly one of three things happens: at least one descriptor fires
    /// and its handlers run in ascending order; the timeout elapses and
    /// every idle handler runs in insertion order; or the wait primitive
    /// fails (e.g. interrupted by a signal) and the cycle reports
    /// [`CycleStep::Stop`]. A cycle entered with no registered
    /// descriptors also reports [`CycleStep::Stop`]: handlers can only be
    /// added before the loop or from within handlers, so none can
    /// reappear.
    pub fn single_cycle(&mut self, timeout: Duration) -> CycleStep {
        let watched: Vec<RawFd> = self.read_handlers.keys().copied().collect();
        if watched.is_empty() {
            return CycleStep::Stop;
        }

        let mut poll_fds: Vec<PollFd> = watched
            .iter()
            .map(|&fd| {
                // Registration hands over responsibility for keeping the
                // descriptor open; see `on_readable`.
                let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
                PollFd::new(borrowed, PollFlags::POLLIN)
            })
            .collect();

        let millis = u16::try_from(timeout.as_millis()).unwrap_or(u16::MAX);
        let ready_count = match poll(&mut poll_fds, PollTimeout::from(millis)) {
            Ok(count) => count,
            Err(errno) => {
                warn!(
                    target: REACTOR_TARGET,
                    error = %errno,
                    "poll failed, stopping the loop"
                );
                return CycleStep::Stop;
            }
        };

        if ready_count == 0 {
            self.run_idle_handlers();
            return CycleStep::Continue;
        }

        let ready: Vec<RawFd> = watched
            .iter()
            .zip(poll_fds.iter())
            .filter(|(_, poll_fd)| {
                poll_fd
                    .revents()
                    .is_some_and(|revents| !revents.is_empty())
            })
            .map(|(&fd, _)| fd)
            .collect();

        for fd in ready {
            let Some(mut handler) = self.read_handlers.remove(&fd) else {
                continue;
            };
            if handler() == HandlerOutcome::Keep {
                self.read_handlers.insert(fd, handler);
            }
        }

        CycleStep::Continue
    }

    fn run_idle_handlers(&mut self) {
        let mut kept = Vec::with_capacity(self.idle_handlers.len());
        for mut handler in self.idle_handlers.drain(..) {
            if handler() == HandlerOutcome::Keep {
                kept.push(handler);
            }
        }
        self.idle_handlers = kept;
    }
}
