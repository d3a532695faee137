use beacon_core::{ConnectionId, TrackId};

/// Relay-originated work, delivered into the destination connection's own
/// queue so it interleaves cleanly with that connection's signaling.
#[derive(Debug)]
pub enum ConnectionCommand<T> {
    AddTrack { source: ConnectionId, track: T },
    RemoveTrack { track_id: TrackId },
    Renegotiate,
}
