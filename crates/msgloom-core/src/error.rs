//! Shared error type across msgLoom crates.

use thiserror::Error;

/// Stable error codes surfaced to embedding applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Payload bytes did not parse for a known message tag.
    Decode,
    /// Correlated envelope with no matching pending request.
    ProtocolViolation,
    /// A request reached a context it must never reach (e.g. id 0).
    Integrity,
    /// Correlation id already has a pending completion.
    DuplicateRequestId,
    /// Request handle already carries a completion.
    AlreadyAttached,
    /// Invalid or unparsable configuration.
    Config,
    /// Internal error.
    Internal,
}

impl ErrorCode {
    /// String representation used in logs and diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Decode => "DECODE",
            ErrorCode::ProtocolViolation => "PROTOCOL_VIOLATION",
            ErrorCode::Integrity => "INTEGRITY",
            ErrorCode::DuplicateRequestId => "DUPLICATE_REQUEST_ID",
            ErrorCode::AlreadyAttached => "ALREADY_ATTACHED",
            ErrorCode::Config => "CONFIG",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, MsgLoomError>;

/// Unified error type used by core and dispatch.
#[derive(Debug, Error)]
pub enum MsgLoomError {
    #[error("decode failed for tag {tag:#06x}: {reason}")]
    Decode { tag: u32, reason: String },
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
    #[error("integrity: {0}")]
    Integrity(String),
    #[error("duplicate request id {0}")]
    DuplicateRequestId(u64),
    #[error("completion already attached to request {0}")]
    AlreadyAttached(u64),
    #[error("config: {0}")]
    Config(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl MsgLoomError {
    /// Map internal error to a stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            MsgLoomError::Decode { .. } => ErrorCode::Decode,
            MsgLoomError::ProtocolViolation(_) => ErrorCode::ProtocolViolation,
            MsgLoomError::Integrity(_) => ErrorCode::Integrity,
            MsgLoomError::DuplicateRequestId(_) => ErrorCode::DuplicateRequestId,
            MsgLoomError::AlreadyAttached(_) => ErrorCode::AlreadyAttached,
            MsgLoomError::Config(_) => ErrorCode::Config,
            MsgLoomError::Internal(_) => ErrorCode::Internal,
        }
    }
}
