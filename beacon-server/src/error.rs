use crate::session::SessionError;
use beacon_core::RoomId;
use thiserror::Error;

/// Connection-scoped failures; none of these ever touch registry state or
/// other connections' sessions.
#[derive(Debug, Error)]
pub enum SignalingError {
    /// Malformed or out-of-sequence message; closes the connection.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// Join conflict; the connection stays in its prior state.
    #[error("already in room '{0}'")]
    AlreadyInRoom(RoomId),

    #[error("negotiation failure: {0}")]
    NegotiationFailure(#[from] SessionError),

    /// Relay work addressed to a connection that is already gone.
    #[error("peer unreachable")]
    PeerUnreachable,
}
