mod connection;
mod room;
mod signaling;
mod track;

pub use connection::ConnectionId;
pub use room::RoomId;
pub use signaling::{IceCandidate, IceServerConfig, SignalMessage};
pub use track::{TrackId, TrackKind};
