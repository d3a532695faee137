use async_trait::async_trait;
use beacon_core::{ConnectionId, IceCandidate, TrackId, TrackKind};
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("peer session is closed")]
    Closed,
    #[error(transparent)]
    Rtc(#[from] webrtc::Error),
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Clone)]
pub enum SessionDescription {
    Offer(String),
    Answer(String),
}

/// Opaque handle to one media stream. Clones share the underlying source,
/// so one logical track is fanned out instead of re-read per destination.
pub trait MediaTrack: Clone + Send + Sync + 'static {
    fn id(&self) -> &TrackId;
    fn kind(&self) -> TrackKind;
}

/// Events a peer session reports back to its owning connection task,
/// delivered over a channel rather than via re-entrant callbacks.
#[derive(Debug)]
pub enum SessionEvent<T> {
    TrackReceived(T),
    TrackEnded(TrackId),
    /// A local candidate to trickle out; an end-of-candidates marker once
    /// gathering finishes.
    CandidateGenerated(IceCandidate),
    Disconnected,
}

/// The capability the core requires from the transport engine.
#[async_trait]
pub trait PeerSession: Send + Sync + 'static {
    type Track: MediaTrack;

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), SessionError>;

    async fn create_answer(&self) -> Result<String, SessionError>;

    async fn create_offer(&self) -> Result<String, SessionError>;

    /// Must tolerate candidates arriving before the remote description is
    /// set, buffering them until it is.
    async fn add_candidate(&self, candidate: IceCandidate) -> Result<(), SessionError>;

    async fn add_track(&self, track: Self::Track) -> Result<(), SessionError>;

    async fn remove_track(&self, track_id: &TrackId) -> Result<(), SessionError>;

    async fn close(&self);
}

/// Builds one peer session per accepted signaling connection.
#[async_trait]
pub trait SessionFactory: Send + Sync + 'static {
    type Session: PeerSession;

    async fn create(
        &self,
        connection_id: ConnectionId,
        events: mpsc::Sender<SessionEvent<<Self::Session as PeerSession>::Track>>,
    ) -> Result<Self::Session, SessionError>;
}
