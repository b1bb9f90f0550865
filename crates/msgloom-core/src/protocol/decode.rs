//! Total decode over message-type tags (panic-free).
//!
//! Decode rules:
//! - Each envelope is decoded exactly once; the result is immutable.
//! - An error-flagged envelope short-circuits to `ErrorInfo`; payload bytes
//!   are never touched.
//! - A known tag must map to exactly one `Payload` variant. The `match` in
//!   `decode_known` has no default arm, so the compiler rejects an unmapped
//!   tag instead of silently dropping its data.
//! - Unknown tags fall through to the secondary decoder table, then to
//!   `Payload::Unrecognized` (logged, never an error).

use std::collections::HashMap;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{MsgLoomError, Result};
use crate::protocol::envelope::{Envelope, ErrorInfo, MessageTag};

/// Matchmaking enqueue acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnqueueResult {
    pub avg_wait_ms: u64,
    pub queue_depth: u32,
}

/// A formed match.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchInfo {
    pub match_id: String,
    pub players: Vec<String>,
}

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub user_id: String,
    pub score: i64,
}

/// A page of leaderboard rows.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LeaderboardPage {
    pub entries: Vec<LeaderboardEntry>,
    #[serde(default)]
    pub next_offset: Option<u64>,
}

/// Leaderboard write acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WriteAck {
    pub updated: bool,
}

/// Room snapshot. Delivered both as a request reply and as a notification.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Room {
    pub room_id: String,
    pub owner_id: String,
    pub joinable: bool,
    #[serde(default)]
    pub member_ids: Vec<String>,
}

/// Minimal user record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserInfo {
    pub user_id: String,
    pub display_name: String,
}

/// A page of friends.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FriendsPage {
    pub friends: Vec<UserInfo>,
}

/// Party snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Party {
    pub party_id: String,
    pub leader_id: String,
    #[serde(default)]
    pub member_ids: Vec<String>,
}

/// A received room invite ("pending invites" stream; accumulate-buffered).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InviteInfo {
    pub invite_id: String,
    pub sender_id: String,
    pub room_id: String,
    pub sent_at_ms: u64,
}

/// Current launch intent ("current intent" stream; replace-buffered).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LaunchIntent {
    pub intent_type: String,
    #[serde(default)]
    pub deeplink: Option<String>,
    #[serde(default)]
    pub room_id: Option<String>,
}

/// One ping measurement.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PingSample {
    pub latency_ms: u64,
}

/// Decoded payload: one variant per known tag, plus the extension and
/// unrecognized outcomes.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    MatchmakingEnqueueResult(EnqueueResult),
    MatchmakingMatchFound(MatchInfo),
    LeaderboardEntries(LeaderboardPage),
    LeaderboardWriteAck(WriteAck),
    RoomUpdate(Room),
    RoomInviteReceived(InviteInfo),
    UserProfile(UserInfo),
    FriendsList(FriendsPage),
    PartyUpdate(Party),
    LaunchIntentChanged(LaunchIntent),
    PingResult(PingSample),
    /// Decoded by a registered extension hook.
    Extension { tag: u32, value: serde_json::Value },
    /// Tag known to neither the core nor any extension.
    Unrecognized { tag: u32 },
}

/// One fully decoded message. `result` is `Err` iff the envelope was
/// error-flagged; callers must check before reading the payload.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMessage {
    /// Wire-level message-type tag.
    pub tag: u32,
    /// Correlation id (`0` for notifications).
    pub request_id: u64,
    /// Decoded payload, or the producer's error details.
    pub result: std::result::Result<Payload, ErrorInfo>,
}

impl DecodedMessage {
    /// Whether the envelope was error-flagged.
    pub fn is_error(&self) -> bool {
        self.result.is_err()
    }

    /// Decoded payload, if this is not an error completion.
    pub fn payload(&self) -> Option<&Payload> {
        self.result.as_ref().ok()
    }

    /// Producer error details, if this is an error completion.
    pub fn error(&self) -> Option<&ErrorInfo> {
        self.result.as_ref().err()
    }
}

/// Secondary decode hook for tags outside the core set.
pub type ExtensionFn = Box<dyn Fn(&Bytes) -> Result<serde_json::Value>>;

/// Total decoder: known tags, extension table, unrecognized fallthrough.
#[derive(Default)]
pub struct Decoder {
    extensions: HashMap<u32, ExtensionFn>,
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            extensions: HashMap::new(),
        }
    }

    /// Register a decode hook for an out-of-core tag. Registering the same
    /// tag again replaces the previous hook. Core tags cannot be shadowed.
    pub fn register_extension(&mut self, tag: u32, hook: ExtensionFn) -> Result<()> {
        if MessageTag::from_wire(tag).is_some() {
            return Err(MsgLoomError::Integrity(format!(
                "tag {tag:#06x} is a core message tag and cannot be shadowed"
            )));
        }
        self.extensions.insert(tag, hook);
        Ok(())
    }

    /// Decode one envelope.
    ///
    /// Errors only on malformed payload bytes for a known tag; unrecognized
    /// tags decode to `Payload::Unrecognized`.
    pub fn decode(&self, env: &Envelope) -> Result<DecodedMessage> {
        if env.is_error {
            let info = env.error.clone().unwrap_or_else(|| ErrorInfo {
                code: 0,
                message: "error-flagged envelope without error details".into(),
                http_code: 0,
            });
            return Ok(DecodedMessage {
                tag: env.tag,
                request_id: env.request_id,
                result: Err(info),
            });
        }

        let payload = match MessageTag::from_wire(env.tag) {
            Some(tag) => decode_known(tag, &env.payload)?,
            None => match self.extensions.get(&env.tag) {
                Some(hook) => Payload::Extension {
                    tag: env.tag,
                    value: hook(&env.payload)?,
                },
                None => {
                    tracing::warn!(tag = env.tag, "unrecognized message tag; payload dropped");
                    Payload::Unrecognized { tag: env.tag }
                }
            },
        };

        Ok(DecodedMessage {
            tag: env.tag,
            request_id: env.request_id,
            result: Ok(payload),
        })
    }
}

fn parse<T: DeserializeOwned>(tag: MessageTag, buf: &Bytes) -> Result<T> {
    serde_json::from_slice(buf).map_err(|e| MsgLoomError::Decode {
        tag: tag.wire(),
        reason: e.to_string(),
    })
}

// Exhaustive by construction: no default arm.
fn decode_known(tag: MessageTag, buf: &Bytes) -> Result<Payload> {
    Ok(match tag {
        MessageTag::MatchmakingEnqueueResult => {
            Payload::MatchmakingEnqueueResult(parse(tag, buf)?)
        }
        MessageTag::MatchmakingMatchFound => Payload::MatchmakingMatchFound(parse(tag, buf)?),
        MessageTag::LeaderboardEntries => Payload::LeaderboardEntries(parse(tag, buf)?),
        MessageTag::LeaderboardWriteAck => Payload::LeaderboardWriteAck(parse(tag, buf)?),
        MessageTag::RoomUpdate => Payload::RoomUpdate(parse(tag, buf)?),
        MessageTag::RoomInviteReceived => Payload::RoomInviteReceived(parse(tag, buf)?),
        MessageTag::UserProfile => Payload::UserProfile(parse(tag, buf)?),
        MessageTag::FriendsList => Payload::FriendsList(parse(tag, buf)?),
        MessageTag::PartyUpdate => Payload::PartyUpdate(parse(tag, buf)?),
        MessageTag::LaunchIntentChanged => Payload::LaunchIntentChanged(parse(tag, buf)?),
        MessageTag::PingResult => Payload::PingResult(parse(tag, buf)?),
    })
}
