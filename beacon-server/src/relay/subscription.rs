use beacon_core::{ConnectionId, TrackId};

/// Directed (source, track, destination) forwarding relation.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct Subscription {
    pub source: ConnectionId,
    pub track: TrackId,
    pub destination: ConnectionId,
}
