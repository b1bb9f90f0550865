//! One in-flight, correlation-id-bearing call.
//!
//! A `Request` starts `Created`, becomes `Pending` after exactly one
//! `on_complete`, and ends `Completed` (callback fired once by the pump) or
//! `Abandoned` (teardown; callback never fires). A request issued without a
//! correlation id is `Failed` from birth and surfaces that failure
//! synchronously on attach instead of silently dropping it.
//!
//! All transitions happen on the thread driving `pump()`; there is no
//! concurrent completion path.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use msgloom_core::error::{MsgLoomError, Result};
use msgloom_core::protocol::decode::DecodedMessage;

use crate::dispatcher::Registries;

/// One-shot completion stored in the pending registry. Single-fulfillment:
/// the registry holds at most one of these per correlation id, and callback
/// registration is the only way to supply it.
pub type Completion = Box<dyn FnOnce(DecodedMessage) -> Result<()>>;

/// Request lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Issued, no completion attached yet.
    Created,
    /// Completion registered; waiting for the correlated envelope.
    Pending,
    /// Completion fired exactly once. Terminal.
    Completed,
    /// Torn down while pending; completion never fired. Terminal.
    Abandoned,
    /// Issued without a correlation id; cannot be registered. Terminal.
    Failed,
}

/// Handle for one asynchronous call.
pub struct Request {
    id: u64,
    state: Rc<Cell<RequestState>>,
    registries: Rc<RefCell<Registries>>,
}

impl Request {
    pub(crate) fn new(id: u64, registries: Rc<RefCell<Registries>>) -> Self {
        let initial = if id == 0 {
            RequestState::Failed
        } else {
            RequestState::Created
        };
        Self {
            id,
            state: Rc::new(Cell::new(initial)),
            registries,
        }
    }

    /// Correlation id of this call (`0` for an early failure).
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Current lifecycle state. Updated by the pump on completion and by
    /// teardown on abandonment.
    pub fn state(&self) -> RequestState {
        self.state.get()
    }

    /// Attach the completion callback. Allowed exactly once.
    ///
    /// Errors:
    /// - `Integrity` if the request was issued without a correlation id;
    /// - `AlreadyAttached` on any second attach attempt;
    /// - `DuplicateRequestId` if another pending request already holds the id.
    pub fn on_complete<F>(&mut self, callback: F) -> Result<()>
    where
        F: FnOnce(DecodedMessage) -> Result<()> + 'static,
    {
        match self.state.get() {
            RequestState::Failed => Err(MsgLoomError::Integrity(
                "request was issued without a correlation id".into(),
            )),
            RequestState::Created => {
                self.registries.borrow_mut().register_request(
                    self.id,
                    Box::new(callback),
                    Rc::clone(&self.state),
                )?;
                self.state.set(RequestState::Pending);
                Ok(())
            }
            RequestState::Pending | RequestState::Completed | RequestState::Abandoned => {
                Err(MsgLoomError::AlreadyAttached(self.id))
            }
        }
    }
}
