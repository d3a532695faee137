use crate::model::connection::ConnectionId;
use crate::model::room::RoomId;
use crate::model::track::TrackId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

/// One ICE candidate as carried on the wire. An empty `candidate` string
/// signals end-of-candidates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IceCandidate {
    pub candidate: String,
    pub sdp_mid: Option<String>,
    pub sdp_m_line_index: Option<u16>,
}

impl IceCandidate {
    pub fn end_of_candidates() -> Self {
        Self {
            candidate: String::new(),
            sdp_mid: None,
            sdp_m_line_index: None,
        }
    }

    pub fn is_end_of_candidates(&self) -> bool {
        self.candidate.is_empty()
    }
}

/// Messages exchanged over the signaling transport.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SignalMessage {
    /// First server message on a new transport.
    Welcome {
        connection_id: ConnectionId,
        rooms: Vec<RoomId>,
    },
    Join { room: RoomId },
    /// Ack for `join`; `peers` excludes the joiner.
    Joined {
        room: RoomId,
        peers: Vec<ConnectionId>,
    },
    /// Non-fatal join rejection; the connection keeps its prior state.
    JoinFailed { reason: String },
    Offer { sdp: String },
    Answer { sdp: String },
    IceCandidate {
        candidate: String,
        sdp_mid: Option<String>,
        sdp_m_line_index: Option<u16>,
    },
    Leave,
    /// A forwarded track's source went away; the removal renegotiation
    /// follows separately.
    TrackEnded { track_id: TrackId },
    /// Fatal; terminates the connection.
    Error { message: String },
}

impl SignalMessage {
    /// Wire name of the message kind, as carried in the `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            SignalMessage::Welcome { .. } => "welcome",
            SignalMessage::Join { .. } => "join",
            SignalMessage::Joined { .. } => "joined",
            SignalMessage::JoinFailed { .. } => "join-failed",
            SignalMessage::Offer { .. } => "offer",
            SignalMessage::Answer { .. } => "answer",
            SignalMessage::IceCandidate { .. } => "ice-candidate",
            SignalMessage::Leave => "leave",
            SignalMessage::TrackEnded { .. } => "track-ended",
            SignalMessage::Error { .. } => "error",
        }
    }
}

impl From<IceCandidate> for SignalMessage {
    fn from(c: IceCandidate) -> Self {
        SignalMessage::IceCandidate {
            candidate: c.candidate,
            sdp_mid: c.sdp_mid,
            sdp_m_line_index: c.sdp_m_line_index,
        }
    }
}
