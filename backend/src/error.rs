//! Error types shared by the service, the HTTP surface and the peer side.

use thiserror::Error;

use crate::room_id::RoomId;

/// Input that failed shape validation before touching any room state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedInput {
    #[error("room id must be 8 uppercase letters")]
    RoomId,

    #[error("commitment must be 64 lowercase hex characters")]
    Commitment,

    #[error("salt must be 32 lowercase hex characters")]
    Salt,

    #[error("invalid invite link: {0}")]
    InviteLink(String),
}

/// Protocol-level failures. All of them are terminal for the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RendezvousError {
    /// The room was never created, has completed, or was torn down.
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// Submit attempted before both parties joined.
    #[error("room {0} is not ready")]
    NotReady(RoomId),

    /// The hold deadline elapsed before the other party arrived.
    #[error("timed out waiting for the other party")]
    Timeout,

    #[error("malformed input: {0}")]
    Malformed(#[from] MalformedInput),

    /// An invariant was violated; the request fails closed.
    #[error("internal error: {0}")]
    Internal(String),
}
