use crate::config::SessionConfig;
use crate::session::{
    MediaTrack, PeerSession, SessionDescription, SessionError, SessionEvent, SessionFactory,
};
use async_trait::async_trait;
use beacon_core::{ConnectionId, IceCandidate, TrackId, TrackKind};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::track::track_local::track_local_static_rtp::TrackLocalStaticRTP;
use webrtc::track::track_local::{TrackLocal, TrackLocalWriter};
use webrtc::track::track_remote::TrackRemote;

/// An inbound track mirrored into a local RTP track. One forwarder task
/// reads the remote track and writes into `local`; every destination peer
/// connection binds to the same `local`, so the source is read exactly once.
#[derive(Clone)]
pub struct RtcTrack {
    id: TrackId,
    kind: TrackKind,
    local: Arc<TrackLocalStaticRTP>,
}

impl fmt::Debug for RtcTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RtcTrack")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish()
    }
}

impl MediaTrack for RtcTrack {
    fn id(&self) -> &TrackId {
        &self.id
    }

    fn kind(&self) -> TrackKind {
        self.kind
    }
}

/// Remote candidates may arrive before the remote description; they are
/// held here and flushed, in arrival order, once it is set.
#[derive(Default)]
struct PendingCandidates {
    remote_set: bool,
    buffered: Vec<IceCandidate>,
}

impl PendingCandidates {
    /// Returns the candidate back if it can be applied right away, `None`
    /// if it was buffered.
    fn admit(&mut self, candidate: IceCandidate) -> Option<IceCandidate> {
        if self.remote_set {
            Some(candidate)
        } else {
            self.buffered.push(candidate);
            None
        }
    }

    /// Marks the remote description as set and drains the buffer.
    fn remote_ready(&mut self) -> Vec<IceCandidate> {
        self.remote_set = true;
        std::mem::take(&mut self.buffered)
    }
}

/// Peer session backed by the `webrtc` crate.
pub struct RtcPeerSession {
    connection_id: ConnectionId,
    peer_connection: Arc<RTCPeerConnection>,
    senders: Mutex<HashMap<TrackId, Arc<RTCRtpSender>>>,
    pending: Mutex<PendingCandidates>,
}

impl RtcPeerSession {
    pub async fn new(
        connection_id: ConnectionId,
        config: &SessionConfig,
        events: mpsc::Sender<SessionEvent<RtcTrack>>,
    ) -> Result<Self, SessionError> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: config
                .ice_servers
                .iter()
                .map(|s| RTCIceServer {
                    urls: s.urls.clone(),
                    username: s.username.clone().unwrap_or_default(),
                    credential: s.credential.clone().unwrap_or_default(),
                })
                .collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(api.new_peer_connection(rtc_config).await?);

        let state_tx = events.clone();
        let state_id = connection_id;
        peer_connection.on_peer_connection_state_change(Box::new(
            move |state: RTCPeerConnectionState| {
                let tx = state_tx.clone();

                Box::pin(async move {
                    info!(connection = %state_id, ?state, "peer connection state changed");
                    match state {
                        RTCPeerConnectionState::Failed
                        | RTCPeerConnectionState::Disconnected
                        | RTCPeerConnectionState::Closed => {
                            let _ = tx.send(SessionEvent::Disconnected).await;
                        }
                        _ => {}
                    }
                })
            },
        ));

        // Trickle ICE: every gathered candidate is surfaced immediately,
        // `None` becomes the end-of-candidates marker. No fixed gathering
        // delay anywhere.
        let ice_tx = events.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();

            Box::pin(async move {
                let candidate = match c {
                    Some(candidate) => match candidate.to_json() {
                        Ok(init) => IceCandidate {
                            candidate: init.candidate,
                            sdp_mid: init.sdp_mid,
                            sdp_m_line_index: init.sdp_mline_index,
                        },
                        Err(err) => {
                            warn!(%err, "failed to serialize local candidate");
                            return;
                        }
                    },
                    None => IceCandidate::end_of_candidates(),
                };
                let _ = tx.send(SessionEvent::CandidateGenerated(candidate)).await;
            })
        }));

        let track_tx = events.clone();
        let track_conn = connection_id;
        peer_connection.on_track(Box::new(move |track, _receiver, _transceiver| {
            let tx = track_tx.clone();

            Box::pin(async move {
                let relayed = mirror_remote_track(track_conn, track, tx.clone());
                let _ = tx.send(SessionEvent::TrackReceived(relayed)).await;
            })
        }));

        Ok(Self {
            connection_id,
            peer_connection,
            senders: Mutex::new(HashMap::new()),
            pending: Mutex::new(PendingCandidates::default()),
        })
    }

    async fn apply_candidate(&self, candidate: IceCandidate) -> Result<(), SessionError> {
        if candidate.is_end_of_candidates() {
            debug!(connection = %self.connection_id, "remote end of candidates");
            return Ok(());
        }
        self.peer_connection
            .add_ice_candidate(RTCIceCandidateInit {
                candidate: candidate.candidate,
                sdp_mid: candidate.sdp_mid,
                sdp_mline_index: candidate.sdp_m_line_index,
                username_fragment: None,
            })
            .await?;
        Ok(())
    }
}

/// Spawns the single reader task that copies RTP from the remote track into
/// a shared local track. When the read loop ends the track is reported as
/// ended.
fn mirror_remote_track(
    connection_id: ConnectionId,
    track: Arc<TrackRemote>,
    events: mpsc::Sender<SessionEvent<RtcTrack>>,
) -> RtcTrack {
    let kind = match track.kind() {
        RTPCodecType::Video => TrackKind::Video,
        _ => TrackKind::Audio,
    };
    let id = TrackId::from(track.id());
    info!(connection = %connection_id, track = %id, %kind, "inbound track received");

    // Stream id groups the forwarded tracks by source connection on the
    // destination side.
    let local = Arc::new(TrackLocalStaticRTP::new(
        track.codec().capability,
        track.id(),
        connection_id.to_string(),
    ));

    let forward_local = Arc::clone(&local);
    let forward_id = id.clone();
    tokio::spawn(async move {
        loop {
            match track.read_rtp().await {
                Ok((packet, _)) => {
                    if let Err(err) = forward_local.write_rtp(&packet).await {
                        if webrtc::Error::ErrClosedPipe == err {
                            // No destination bound yet; keep draining.
                            continue;
                        }
                        warn!(track = %forward_id, %err, "rtp forward write failed");
                        break;
                    }
                }
                Err(err) => {
                    debug!(track = %forward_id, %err, "remote track ended");
                    break;
                }
            }
        }
        let _ = events.send(SessionEvent::TrackEnded(forward_id)).await;
    });

    RtcTrack { id, kind, local }
}

#[async_trait]
impl PeerSession for RtcPeerSession {
    type Track = RtcTrack;

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), SessionError> {
        let desc = match desc {
            SessionDescription::Offer(sdp) => RTCSessionDescription::offer(sdp)?,
            SessionDescription::Answer(sdp) => RTCSessionDescription::answer(sdp)?,
        };
        self.peer_connection.set_remote_description(desc).await?;

        let flushed = self.pending.lock().await.remote_ready();
        for candidate in flushed {
            if let Err(err) = self.apply_candidate(candidate).await {
                warn!(connection = %self.connection_id, %err, "buffered candidate rejected");
            }
        }
        Ok(())
    }

    async fn create_answer(&self) -> Result<String, SessionError> {
        let answer = self.peer_connection.create_answer(None).await?;
        let sdp = answer.sdp.clone();
        self.peer_connection.set_local_description(answer).await?;
        Ok(sdp)
    }

    async fn create_offer(&self) -> Result<String, SessionError> {
        let offer = self.peer_connection.create_offer(None).await?;
        let sdp = offer.sdp.clone();
        self.peer_connection.set_local_description(offer).await?;
        Ok(sdp)
    }

    async fn add_candidate(&self, candidate: IceCandidate) -> Result<(), SessionError> {
        match self.pending.lock().await.admit(candidate) {
            Some(candidate) => self.apply_candidate(candidate).await,
            None => Ok(()),
        }
    }

    async fn add_track(&self, track: RtcTrack) -> Result<(), SessionError> {
        let sender = self
            .peer_connection
            .add_track(Arc::clone(&track.local) as Arc<dyn TrackLocal + Send + Sync>)
            .await?;

        // The interceptors only run if RTCP is drained from the sender.
        let rtcp_sender = Arc::clone(&sender);
        tokio::spawn(async move {
            let mut buf = vec![0u8; 1500];
            while let Ok((_, _)) = rtcp_sender.read(&mut buf).await {}
        });

        self.senders.lock().await.insert(track.id.clone(), sender);
        Ok(())
    }

    async fn remove_track(&self, track_id: &TrackId) -> Result<(), SessionError> {
        let Some(sender) = self.senders.lock().await.remove(track_id) else {
            return Ok(());
        };
        self.peer_connection.remove_track(&sender).await?;
        Ok(())
    }

    async fn close(&self) {
        if let Err(err) = self.peer_connection.close().await {
            warn!(connection = %self.connection_id, %err, "error closing peer connection");
        }
    }
}

/// Builds [`RtcPeerSession`]s from a shared [`SessionConfig`].
#[derive(Clone)]
pub struct RtcSessionFactory {
    config: SessionConfig,
}

impl RtcSessionFactory {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SessionFactory for RtcSessionFactory {
    type Session = RtcPeerSession;

    async fn create(
        &self,
        connection_id: ConnectionId,
        events: mpsc::Sender<SessionEvent<RtcTrack>>,
    ) -> Result<RtcPeerSession, SessionError> {
        RtcPeerSession::new(connection_id, &self.config, events).await
    }
}
