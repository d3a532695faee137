use crate::connection::Connection;
use crate::registry::RoomRegistry;
use crate::relay::MediaRelay;
use crate::session::{PeerSession, SessionError, SessionFactory};
use beacon_core::{ConnectionId, SignalMessage};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

/// Track type produced by a factory's sessions.
pub(crate) type TrackOf<F> = <<F as SessionFactory>::Session as PeerSession>::Track;

const SESSION_EVENTS_CAPACITY: usize = 64;

/// Shared entry point tying the registry, relay and session factory
/// together. One instance serves all connections; cloning is cheap.
pub struct SignalingService<F: SessionFactory> {
    registry: Arc<RoomRegistry>,
    relay: Arc<MediaRelay<TrackOf<F>>>,
    factory: Arc<F>,
}

impl<F: SessionFactory> Clone for SignalingService<F> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            relay: Arc::clone(&self.relay),
            factory: Arc::clone(&self.factory),
        }
    }
}

impl<F: SessionFactory> SignalingService<F> {
    pub fn new(factory: F) -> Self {
        let registry = Arc::new(RoomRegistry::new());
        let relay = Arc::new(MediaRelay::new(Arc::clone(&registry)));
        Self {
            registry,
            relay,
            factory: Arc::new(factory),
        }
    }

    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    pub fn relay(&self) -> &Arc<MediaRelay<TrackOf<F>>> {
        &self.relay
    }

    /// Accept a new signaling connection: assign an id, create its peer
    /// session and spawn the connection task. `out_tx` carries messages
    /// back to the transport; `msg_rx` delivers inbound messages in
    /// arrival order. Dropping the `msg_rx` sender closes the connection.
    pub async fn accept(
        &self,
        out_tx: mpsc::Sender<SignalMessage>,
        msg_rx: mpsc::Receiver<SignalMessage>,
    ) -> Result<ConnectionId, SessionError> {
        let id = ConnectionId::new();
        let (event_tx, event_rx) = mpsc::channel(SESSION_EVENTS_CAPACITY);

        let session = Arc::new(self.factory.create(id, event_tx).await?);
        let connection = Connection::new(
            id,
            session,
            Arc::clone(&self.registry),
            Arc::clone(&self.relay),
            out_tx,
            msg_rx,
            event_rx,
        );
        tokio::spawn(connection.run());

        info!(connection = %id, "accepted signaling connection");
        Ok(id)
    }
}
