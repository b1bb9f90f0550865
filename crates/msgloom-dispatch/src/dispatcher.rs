//! Correlation and dispatch core.
//!
//! The `Dispatcher` owns two registries (pending requests by correlation id,
//! notification handlers by tag) plus per-tag backlogs, and drives the
//! pop-decode-route cycle. Routing per envelope:
//!
//! 1. decode once;
//! 2. nonzero correlation id found in the pending map → remove the entry,
//!    then invoke its completion (removal first, so cleanup holds on every
//!    exit path);
//! 3. nonzero id with no match → protocol violation, logged and dropped —
//!    id match strictly precedes type match, so a stray correlated envelope
//!    is never rerouted to a type handler;
//! 4. id 0 with a registered handler for the tag → invoke it;
//! 5. id 0, no handler, backlog-eligible tag → buffer per that tag's policy;
//! 6. otherwise drop at debug level.
//!
//! Callback failures are contained per envelope: one failing handler never
//! aborts the remaining envelopes of that pump call.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use msgloom_core::error::{MsgLoomError, Result};
use msgloom_core::protocol::decode::{DecodedMessage, Decoder};
use msgloom_core::protocol::envelope::{Envelope, MessageTag};

use crate::backlog::{policy_for, Backlog};
use crate::config::DispatchConfig;
use crate::request::{Completion, Request, RequestState};
use crate::source::MessageSource;

/// Persistent per-tag notification callback.
pub type NotificationCallback = Box<dyn FnMut(DecodedMessage) -> Result<()>>;

/// Counters for one pump call (or one backlog flush).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpStats {
    /// Envelopes popped from the source.
    pub popped: u64,
    /// Pending requests completed.
    pub completed: u64,
    /// Notifications delivered to a registered handler.
    pub notified: u64,
    /// Notifications buffered into a backlog.
    pub buffered: u64,
    /// Envelopes dropped (decode failure, protocol violation, no route).
    pub dropped: u64,
    /// Callbacks that returned an error (contained, never fatal).
    pub callback_failures: u64,
}

struct PendingRequest {
    completion: Completion,
    state: Rc<Cell<RequestState>>,
}

/// Explicit per-tag notification state. The buffer-to-handler transition is
/// a visible state change, not an implicit boolean.
enum NotificationSlot {
    /// No handler yet; early notifications pile up here.
    AwaitingHandler(Backlog),
    /// Handler registered. `None` while the callback is taken out for
    /// invocation, which makes last-write-wins well-defined if the callback
    /// re-registers its own tag.
    Registered(Option<NotificationCallback>),
}

/// Both registries. Shared between the dispatcher and the request handles it
/// issues; single-threaded, so a `RefCell` suffices.
pub(crate) struct Registries {
    pending: HashMap<u64, PendingRequest>,
    notifications: HashMap<u32, NotificationSlot>,
}

impl Registries {
    fn new() -> Self {
        Self {
            pending: HashMap::new(),
            notifications: HashMap::new(),
        }
    }

    pub(crate) fn register_request(
        &mut self,
        id: u64,
        completion: Completion,
        state: Rc<Cell<RequestState>>,
    ) -> Result<()> {
        debug_assert_ne!(id, 0, "id 0 must be rejected by the request handle");
        if self.pending.contains_key(&id) {
            return Err(MsgLoomError::DuplicateRequestId(id));
        }
        self.pending.insert(id, PendingRequest { completion, state });
        Ok(())
    }
}

/// Owns the registries, the decoder, and the source; drives the pump.
pub struct Dispatcher {
    registries: Rc<RefCell<Registries>>,
    decoder: Decoder,
    source: Box<dyn MessageSource>,
    cfg: DispatchConfig,
}

impl Dispatcher {
    pub fn new(cfg: DispatchConfig, decoder: Decoder, source: Box<dyn MessageSource>) -> Self {
        Self {
            registries: Rc::new(RefCell::new(Registries::new())),
            decoder,
            source,
            cfg,
        }
    }

    /// Issue a handle for one in-flight call. The correlation id is assigned
    /// by the call-site, not by this core. `id == 0` denotes a call that
    /// failed before an id could be issued; the returned handle is `Failed`
    /// and surfaces that on attach.
    pub fn issue_request(&self, id: u64) -> Request {
        if id == 0 {
            tracing::warn!("request issued without a correlation id");
        }
        Request::new(id, Rc::clone(&self.registries))
    }

    /// Register (or replace, last-write-wins) the notification handler for a
    /// tag. If the tag has a non-empty backlog, it is flushed synchronously
    /// here, in arrival order, before this call returns.
    pub fn register_notification<F>(&self, tag: MessageTag, callback: F)
    where
        F: FnMut(DecodedMessage) -> Result<()> + 'static,
    {
        let mut callback: NotificationCallback = Box::new(callback);
        let wire = tag.wire();

        let backlog = {
            let mut reg = self.registries.borrow_mut();
            match reg.notifications.insert(wire, NotificationSlot::Registered(None)) {
                Some(NotificationSlot::AwaitingHandler(backlog)) => Some(backlog),
                // Previous handler (if any) is dropped: last write wins.
                Some(NotificationSlot::Registered(_)) | None => None,
            }
        };

        if let Some(backlog) = backlog {
            let entries = backlog.drain();
            tracing::debug!(tag = tag.name(), count = entries.len(), "flushing backlog");
            for msg in entries {
                if let Err(e) = callback(msg) {
                    tracing::warn!(tag = tag.name(), error = %e, "notification handler failed during flush");
                }
            }
        }

        // Install unless the callback re-registered this tag during the
        // flush, in which case that later registration wins.
        let mut reg = self.registries.borrow_mut();
        if let Some(NotificationSlot::Registered(slot)) = reg.notifications.get_mut(&wire) {
            if slot.is_none() {
                *slot = Some(callback);
            }
        }
    }

    /// Drain the source until it is empty, or until the configured default
    /// pump limit is reached (0 = unbounded).
    pub fn pump(&mut self) -> PumpStats {
        let limit = match self.cfg.pump.default_limit {
            0 => None,
            n => Some(n),
        };
        self.pump_inner(limit)
    }

    /// Drain at most `limit` envelopes, leaving the rest for a later pump.
    pub fn pump_limit(&mut self, limit: usize) -> PumpStats {
        self.pump_inner(Some(limit))
    }

    fn pump_inner(&mut self, limit: Option<usize>) -> PumpStats {
        let mut stats = PumpStats::default();
        loop {
            if let Some(n) = limit {
                if stats.popped >= n as u64 {
                    break;
                }
            }
            let Some(env) = self.source.pop_next() else {
                break;
            };
            stats.popped += 1;
            self.route(env, &mut stats);
        }
        stats
    }

    fn route(&mut self, env: Envelope, stats: &mut PumpStats) {
        let msg = match self.decoder.decode(&env) {
            Ok(msg) => msg,
            Err(e) => {
                stats.dropped += 1;
                tracing::warn!(
                    tag = env.tag,
                    request_id = env.request_id,
                    error = %e,
                    "decode failed; envelope dropped"
                );
                return;
            }
        };

        if msg.request_id != 0 {
            self.route_request(msg, stats);
        } else {
            self.route_notification(msg, stats);
        }
    }

    /// Id match strictly precedes type match: a correlated envelope either
    /// completes its pending request or is dropped, never rerouted.
    fn route_request(&mut self, msg: DecodedMessage, stats: &mut PumpStats) {
        let entry = self.registries.borrow_mut().pending.remove(&msg.request_id);
        let Some(pending) = entry else {
            stats.dropped += 1;
            let err = MsgLoomError::ProtocolViolation(format!(
                "no pending request for correlation id {}",
                msg.request_id
            ));
            tracing::warn!(tag = msg.tag, error = %err, "envelope dropped");
            return;
        };

        // Entry already removed above, so cleanup holds even if the
        // completion fails.
        pending.state.set(RequestState::Completed);
        stats.completed += 1;
        if let Err(e) = (pending.completion)(msg) {
            stats.callback_failures += 1;
            tracing::warn!(error = %e, "request completion failed");
        }
    }

    fn route_notification(&mut self, msg: DecodedMessage, stats: &mut PumpStats) {
        let wire = msg.tag;
        let accumulate_cap = self.cfg.backlog.accumulate_cap;

        let taken: Option<NotificationCallback> = {
            let mut reg = self.registries.borrow_mut();
            match reg.notifications.get_mut(&wire) {
                Some(NotificationSlot::Registered(slot)) => {
                    let Some(cb) = slot.take() else {
                        // Callback currently taken out (reentrant dispatch).
                        stats.dropped += 1;
                        tracing::debug!(tag = wire, "handler busy; notification dropped");
                        return;
                    };
                    Some(cb)
                }
                Some(NotificationSlot::AwaitingHandler(backlog)) => {
                    let evicted = backlog.push(msg, accumulate_cap);
                    stats.buffered += 1;
                    if evicted {
                        tracing::warn!(tag = wire, "backlog at capacity; oldest entry evicted");
                    }
                    return;
                }
                None => {
                    match MessageTag::from_wire(wire).and_then(policy_for) {
                        Some(policy) => {
                            let mut backlog = Backlog::new(policy);
                            backlog.push(msg, accumulate_cap);
                            reg.notifications
                                .insert(wire, NotificationSlot::AwaitingHandler(backlog));
                            stats.buffered += 1;
                        }
                        None => {
                            stats.dropped += 1;
                            tracing::debug!(
                                tag = wire,
                                "no handler and not backlog-eligible; notification dropped"
                            );
                        }
                    }
                    return;
                }
            }
        };

        if let Some(mut cb) = taken {
            stats.notified += 1;
            if let Err(e) = cb(msg) {
                stats.callback_failures += 1;
                tracing::warn!(tag = wire, error = %e, "notification handler failed");
            }
            // Restore unless the handler replaced itself while it ran.
            let mut reg = self.registries.borrow_mut();
            if let Some(NotificationSlot::Registered(slot)) = reg.notifications.get_mut(&wire) {
                if slot.is_none() {
                    *slot = Some(cb);
                }
            }
        }
    }

    /// Clear both registries. Requests still pending are abandoned: their
    /// completions never fire, and their handles observe `Abandoned`.
    /// Buffered notifications are discarded.
    pub fn teardown(&mut self) {
        let mut reg = self.registries.borrow_mut();
        let abandoned = reg.pending.len();
        for (_, pending) in reg.pending.drain() {
            pending.state.set(RequestState::Abandoned);
        }
        let discarded: usize = reg
            .notifications
            .values()
            .map(|slot| match slot {
                NotificationSlot::AwaitingHandler(backlog) => backlog.len(),
                NotificationSlot::Registered(_) => 0,
            })
            .sum();
        reg.notifications.clear();
        tracing::info!(
            abandoned_requests = abandoned,
            discarded_backlog = discarded,
            "dispatcher teardown"
        );
    }
}
