//! Envelope model and message-type tags.
//!
//! An `Envelope` is produced once per pop from the native queue, consumed
//! exactly once by the dispatcher, and never revisited. The payload stays
//! opaque (`Bytes`) until the decoder extracts it.

use bytes::Bytes;

/// Correlation id value meaning "notification or early failure".
pub const NO_REQUEST_ID: u64 = 0;

/// Error details carried by an error-flagged envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    /// Producer-defined error code.
    pub code: i32,
    /// Human-readable message.
    pub message: String,
    /// HTTP status of the backing call, if any (0 when absent).
    pub http_code: i32,
}

/// One popped message unit.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Wire-level message-type tag.
    pub tag: u32,
    /// Correlation id; `0` denotes a notification or an early failure.
    pub request_id: u64,
    /// Error flag. When set, payload decoding is skipped entirely.
    pub is_error: bool,
    /// Error details, populated by the producer when `is_error` is set.
    pub error: Option<ErrorInfo>,
    /// Opaque payload handle (zero-copy).
    pub payload: Bytes,
}

impl Envelope {
    /// Whether this envelope carries no correlation id.
    pub fn is_notification(&self) -> bool {
        self.request_id == NO_REQUEST_ID
    }
}

/// Known message kinds. Exhaustive: the decoder matches every variant with
/// no default arm, so adding a tag here forces a decode mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum MessageTag {
    MatchmakingEnqueueResult = 0x0101,
    MatchmakingMatchFound = 0x0102,
    LeaderboardEntries = 0x0201,
    LeaderboardWriteAck = 0x0202,
    RoomUpdate = 0x0301,
    RoomInviteReceived = 0x0302,
    UserProfile = 0x0401,
    FriendsList = 0x0402,
    PartyUpdate = 0x0501,
    LaunchIntentChanged = 0x0601,
    PingResult = 0x0701,
}

impl MessageTag {
    /// Map a wire tag to a known kind, or `None` for unrecognized tags.
    pub fn from_wire(tag: u32) -> Option<Self> {
        match tag {
            0x0101 => Some(MessageTag::MatchmakingEnqueueResult),
            0x0102 => Some(MessageTag::MatchmakingMatchFound),
            0x0201 => Some(MessageTag::LeaderboardEntries),
            0x0202 => Some(MessageTag::LeaderboardWriteAck),
            0x0301 => Some(MessageTag::RoomUpdate),
            0x0302 => Some(MessageTag::RoomInviteReceived),
            0x0401 => Some(MessageTag::UserProfile),
            0x0402 => Some(MessageTag::FriendsList),
            0x0501 => Some(MessageTag::PartyUpdate),
            0x0601 => Some(MessageTag::LaunchIntentChanged),
            0x0701 => Some(MessageTag::PingResult),
            _ => None,
        }
    }

    /// Wire-level value of this tag.
    pub const fn wire(self) -> u32 {
        self as u32
    }

    /// Stable name used in logs.
    pub fn name(self) -> &'static str {
        match self {
            MessageTag::MatchmakingEnqueueResult => "matchmaking_enqueue_result",
            MessageTag::MatchmakingMatchFound => "matchmaking_match_found",
            MessageTag::LeaderboardEntries => "leaderboard_entries",
            MessageTag::LeaderboardWriteAck => "leaderboard_write_ack",
            MessageTag::RoomUpdate => "room_update",
            MessageTag::RoomInviteReceived => "room_invite_received",
            MessageTag::UserProfile => "user_profile",
            MessageTag::FriendsList => "friends_list",
            MessageTag::PartyUpdate => "party_update",
            MessageTag::LaunchIntentChanged => "launch_intent_changed",
            MessageTag::PingResult => "ping_result",
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    const ALL: [MessageTag; 11] = [
        MessageTag::MatchmakingEnqueueResult,
        MessageTag::MatchmakingMatchFound,
        MessageTag::LeaderboardEntries,
        MessageTag::LeaderboardWriteAck,
        MessageTag::RoomUpdate,
        MessageTag::RoomInviteReceived,
        MessageTag::UserProfile,
        MessageTag::FriendsList,
        MessageTag::PartyUpdate,
        MessageTag::LaunchIntentChanged,
        MessageTag::PingResult,
    ];

    #[test]
    fn wire_mapping_is_bijective() {
        for tag in ALL {
            assert_eq!(MessageTag::from_wire(tag.wire()), Some(tag));
        }
        assert_eq!(MessageTag::from_wire(0xdead), None);
    }

    #[test]
    fn zero_request_id_is_notification() {
        let env = Envelope {
            tag: MessageTag::RoomUpdate.wire(),
            request_id: 0,
            is_error: false,
            error: None,
            payload: bytes::Bytes::new(),
        };
        assert!(env.is_notification());
    }
}
