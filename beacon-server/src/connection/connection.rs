use crate::connection::ConnectionCommand;
use crate::error::SignalingError;
use crate::registry::RoomRegistry;
use crate::relay::MediaRelay;
use crate::session::{MediaTrack, PeerSession, SessionDescription, SessionEvent};
use beacon_core::{ConnectionId, IceCandidate, RoomId, SignalMessage};
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
enum ConnState {
    Connected,
    Joined(RoomId),
}

/// At most one server-initiated offer/answer exchange in flight per
/// connection; triggers arriving meanwhile coalesce into one follow-up.
#[derive(Debug, PartialEq)]
enum Negotiation {
    Stable,
    Offering { queued: bool },
}

/// Per-connection signaling state machine, run as its own task. Transport
/// messages, session events and relay commands all land on this task's
/// queues, preserving per-connection ordering without shared locks.
pub struct Connection<S: PeerSession> {
    id: ConnectionId,
    state: ConnState,
    negotiation: Negotiation,
    session: Arc<S>,
    registry: Arc<RoomRegistry>,
    relay: Arc<MediaRelay<S::Track>>,
    out_tx: mpsc::Sender<SignalMessage>,
    msg_rx: mpsc::Receiver<SignalMessage>,
    event_rx: mpsc::Receiver<SessionEvent<S::Track>>,
    cmd_rx: mpsc::Receiver<ConnectionCommand<S::Track>>,
}

impl<S: PeerSession> Connection<S> {
    pub fn new(
        id: ConnectionId,
        session: Arc<S>,
        registry: Arc<RoomRegistry>,
        relay: Arc<MediaRelay<S::Track>>,
        out_tx: mpsc::Sender<SignalMessage>,
        msg_rx: mpsc::Receiver<SignalMessage>,
        event_rx: mpsc::Receiver<SessionEvent<S::Track>>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        relay.register(id, cmd_tx);

        Self {
            id,
            state: ConnState::Connected,
            negotiation: Negotiation::Stable,
            session,
            registry,
            relay,
            out_tx,
            msg_rx,
            event_rx,
            cmd_rx,
        }
    }

    pub async fn run(mut self) {
        info!(connection = %self.id, "connection task started");

        self.send(SignalMessage::Welcome {
            connection_id: self.id,
            rooms: self.registry.room_names(),
        })
        .await;

        let failure = loop {
            tokio::select! {
                msg = self.msg_rx.recv() => match msg {
                    Some(msg) => match self.handle_message(msg).await {
                        Ok(ControlFlow::Continue(())) => {}
                        Ok(ControlFlow::Break(())) => break None,
                        Err(err) => break Some(err),
                    },
                    // Transport disconnect.
                    None => break None,
                },

                evt = self.event_rx.recv() => match evt {
                    Some(evt) => {
                        if self.handle_session_event(evt).await.is_break() {
                            break None;
                        }
                    }
                    None => break None,
                },

                cmd = self.cmd_rx.recv() => match cmd {
                    Some(cmd) => {
                        if let Err(err) = self.handle_command(cmd).await {
                            break Some(err);
                        }
                    }
                    None => break None,
                },
            }
        };

        if let Some(err) = failure {
            warn!(connection = %self.id, %err, "closing connection after failure");
            self.send(SignalMessage::Error {
                message: err.to_string(),
            })
            .await;
        }

        self.teardown().await;
    }

    async fn handle_message(
        &mut self,
        msg: SignalMessage,
    ) -> Result<ControlFlow<()>, SignalingError> {
        match msg {
            SignalMessage::Join { room } => {
                self.handle_join(room).await?;
                Ok(ControlFlow::Continue(()))
            }
            SignalMessage::Offer { sdp } => {
                self.require_joined("offer")?;
                self.handle_offer(sdp).await?;
                Ok(ControlFlow::Continue(()))
            }
            SignalMessage::Answer { sdp } => {
                self.require_joined("answer")?;
                self.handle_answer(sdp).await?;
                Ok(ControlFlow::Continue(()))
            }
            SignalMessage::IceCandidate {
                candidate,
                sdp_mid,
                sdp_m_line_index,
            } => {
                self.require_joined("ice-candidate")?;
                self.session
                    .add_candidate(IceCandidate {
                        candidate,
                        sdp_mid,
                        sdp_m_line_index,
                    })
                    .await?;
                Ok(ControlFlow::Continue(()))
            }
            SignalMessage::Leave => {
                info!(connection = %self.id, "client leaving");
                Ok(ControlFlow::Break(()))
            }
            other => Err(SignalingError::ProtocolViolation(format!(
                "unexpected '{}' message from client",
                other.kind()
            ))),
        }
    }

    async fn handle_join(&mut self, room: RoomId) -> Result<(), SignalingError> {
        match self.registry.join(self.id, room.clone()) {
            Ok(peers) => {
                info!(connection = %self.id, %room, peers = peers.len(), "joined room");
                self.state = ConnState::Joined(room.clone());
                self.send(SignalMessage::Joined {
                    room,
                    peers: peers.clone(),
                })
                .await;
                // Late joiner: pick up tracks already flowing in the room.
                self.relay.sync_new_member(self.id, &peers).await;
                Ok(())
            }
            Err(SignalingError::AlreadyInRoom(current)) => {
                warn!(connection = %self.id, %room, %current, "join rejected");
                self.send(SignalMessage::JoinFailed {
                    reason: format!("already in room '{current}'"),
                })
                .await;
                Ok(())
            }
            Err(other) => Err(other),
        }
    }

    async fn handle_offer(&mut self, sdp: String) -> Result<(), SignalingError> {
        if matches!(self.negotiation, Negotiation::Offering { .. }) {
            // Glare: a server-initiated exchange is in flight and wins; the
            // client retries after answering it.
            warn!(connection = %self.id, "dropping client offer during server renegotiation");
            return Ok(());
        }

        self.session
            .set_remote_description(SessionDescription::Offer(sdp))
            .await?;
        let answer = self.session.create_answer().await?;
        self.send(SignalMessage::Answer { sdp: answer }).await;
        Ok(())
    }

    async fn handle_answer(&mut self, sdp: String) -> Result<(), SignalingError> {
        match self.negotiation {
            Negotiation::Offering { queued } => {
                self.session
                    .set_remote_description(SessionDescription::Answer(sdp))
                    .await?;
                self.negotiation = Negotiation::Stable;
                debug!(connection = %self.id, queued, "renegotiation complete");
                if queued {
                    self.start_renegotiation().await?;
                }
                Ok(())
            }
            Negotiation::Stable => Err(SignalingError::ProtocolViolation(
                "answer without a pending offer".to_owned(),
            )),
        }
    }

    async fn handle_session_event(&mut self, evt: SessionEvent<S::Track>) -> ControlFlow<()> {
        match evt {
            SessionEvent::TrackReceived(track) => {
                info!(connection = %self.id, track = %track.id(), kind = %track.kind(), "publishing inbound track");
                self.relay.publish(self.id, track).await;
                ControlFlow::Continue(())
            }
            SessionEvent::TrackEnded(track_id) => {
                info!(connection = %self.id, track = %track_id, "inbound track ended");
                self.relay.end_track(self.id, &track_id).await;
                ControlFlow::Continue(())
            }
            SessionEvent::CandidateGenerated(candidate) => {
                self.send(candidate.into()).await;
                ControlFlow::Continue(())
            }
            SessionEvent::Disconnected => {
                info!(connection = %self.id, "peer session disconnected");
                ControlFlow::Break(())
            }
        }
    }

    async fn handle_command(
        &mut self,
        cmd: ConnectionCommand<S::Track>,
    ) -> Result<(), SignalingError> {
        match cmd {
            ConnectionCommand::AddTrack { source, track } => {
                debug!(connection = %self.id, %source, track = %track.id(), "adding forwarded track");
                self.session.add_track(track).await?;
                self.start_renegotiation().await?;
            }
            ConnectionCommand::RemoveTrack { track_id } => {
                if let Err(err) = self.session.remove_track(&track_id).await {
                    warn!(connection = %self.id, track = %track_id, %err, "failed to remove stale track");
                }
                self.send(SignalMessage::TrackEnded {
                    track_id: track_id.clone(),
                })
                .await;
                self.start_renegotiation().await?;
            }
            ConnectionCommand::Renegotiate => {
                self.start_renegotiation().await?;
            }
        }
        Ok(())
    }

    /// Starts a server-initiated offer, or queues one if an exchange is
    /// already in flight.
    async fn start_renegotiation(&mut self) -> Result<(), SignalingError> {
        match self.negotiation {
            Negotiation::Stable => {
                let sdp = self.session.create_offer().await?;
                self.send(SignalMessage::Offer { sdp }).await;
                self.negotiation = Negotiation::Offering { queued: false };
            }
            Negotiation::Offering { ref mut queued } => {
                debug!(connection = %self.id, "renegotiation already in flight, queueing");
                *queued = true;
            }
        }
        Ok(())
    }

    fn require_joined(&self, kind: &str) -> Result<(), SignalingError> {
        match self.state {
            ConnState::Joined(_) => Ok(()),
            ConnState::Connected => Err(SignalingError::ProtocolViolation(format!(
                "'{kind}' before joining a room"
            ))),
        }
    }

    async fn send(&self, msg: SignalMessage) {
        if self.out_tx.send(msg).await.is_err() {
            debug!(connection = %self.id, "transport closed, dropping outbound message");
        }
    }

    /// Registry membership, relay subscriptions and the peer session go
    /// together; other connections never observe a half-closed peer.
    async fn teardown(mut self) {
        self.cmd_rx.close();

        if let Some((room, remaining)) = self.registry.leave(self.id) {
            info!(connection = %self.id, %room, remaining = remaining.len(), "left room");
        }
        self.relay.remove_connection(self.id).await;
        self.session.close().await;

        info!(connection = %self.id, "connection closed");
    }
}
