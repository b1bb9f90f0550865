//! External message-producer boundary.

use msgloom_core::protocol::envelope::Envelope;

/// Polled producer of envelopes (the native queue, out of scope here).
///
/// The dispatcher never blocks on the source: `pop_next` must return
/// immediately, with `None` when the queue is currently empty.
pub trait MessageSource {
    /// Pop the next envelope, or `None` when the queue is empty.
    fn pop_next(&mut self) -> Option<Envelope>;
}
