//! Per-type buffers for notifications that arrive before a handler exists.
//!
//! Two policies coexist:
//! - `Replace`: only the newest entry survives ("current intent" streams).
//! - `Accumulate`: an ordered, capped list ("pending invites" streams).
//!
//! A backlog is drained exactly once, in arrival order, the moment a handler
//! is registered for its tag.

use std::collections::VecDeque;

use msgloom_core::protocol::decode::DecodedMessage;
use msgloom_core::protocol::envelope::MessageTag;

/// Buffering policy for a backlog-eligible notification tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BacklogPolicy {
    /// Keep only the newest entry.
    Replace,
    /// Keep an ordered list, capped by config.
    Accumulate,
}

/// Buffering policy for a tag, or `None` for tags that are never buffered.
pub fn policy_for(tag: MessageTag) -> Option<BacklogPolicy> {
    match tag {
        MessageTag::LaunchIntentChanged => Some(BacklogPolicy::Replace),
        MessageTag::RoomInviteReceived => Some(BacklogPolicy::Accumulate),
        _ => None,
    }
}

/// Buffered decoded messages for one tag.
#[derive(Debug)]
pub(crate) enum Backlog {
    Replace(Option<DecodedMessage>),
    Accumulate(VecDeque<DecodedMessage>),
}

impl Backlog {
    pub(crate) fn new(policy: BacklogPolicy) -> Self {
        match policy {
            BacklogPolicy::Replace => Backlog::Replace(None),
            BacklogPolicy::Accumulate => Backlog::Accumulate(VecDeque::new()),
        }
    }

    /// Buffer one message. Returns `true` if an older entry was evicted to
    /// make room (accumulate at cap, or replace with an entry present).
    pub(crate) fn push(&mut self, msg: DecodedMessage, accumulate_cap: usize) -> bool {
        match self {
            Backlog::Replace(slot) => {
                let evicted = slot.is_some();
                *slot = Some(msg);
                evicted
            }
            Backlog::Accumulate(queue) => {
                let mut evicted = false;
                while queue.len() >= accumulate_cap {
                    queue.pop_front();
                    evicted = true;
                }
                queue.push_back(msg);
                evicted
            }
        }
    }

    /// Drain all entries in arrival order. Consumes the backlog.
    pub(crate) fn drain(self) -> Vec<DecodedMessage> {
        match self {
            Backlog::Replace(slot) => slot.into_iter().collect(),
            Backlog::Accumulate(queue) => queue.into_iter().collect(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        match self {
            Backlog::Replace(slot) => usize::from(slot.is_some()),
            Backlog::Accumulate(queue) => queue.len(),
        }
    }
}
