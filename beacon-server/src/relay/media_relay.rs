use crate::connection::ConnectionCommand;
use crate::error::SignalingError;
use crate::registry::RoomRegistry;
use crate::relay::Subscription;
use crate::session::MediaTrack;
use beacon_core::{ConnectionId, TrackId};
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

struct RelayState<T> {
    // Live tracks per source, for bringing late joiners up to date.
    published: HashMap<ConnectionId, Vec<T>>,
    subscriptions: HashSet<Subscription>,
}

impl<T> Default for RelayState<T> {
    fn default() -> Self {
        Self {
            published: HashMap::new(),
            subscriptions: HashSet::new(),
        }
    }
}

/// Fans inbound tracks out to the other members of a source's room. Never
/// touches peer sessions directly; forwarding work goes out as
/// [`ConnectionCommand`]s into each destination's queue.
pub struct MediaRelay<T: MediaTrack> {
    registry: Arc<RoomRegistry>,
    handles: DashMap<ConnectionId, mpsc::Sender<ConnectionCommand<T>>>,
    state: Mutex<RelayState<T>>,
}

impl<T: MediaTrack> MediaRelay<T> {
    pub fn new(registry: Arc<RoomRegistry>) -> Self {
        Self {
            registry,
            handles: DashMap::new(),
            state: Mutex::new(RelayState::default()),
        }
    }

    pub fn register(&self, id: ConnectionId, cmd_tx: mpsc::Sender<ConnectionCommand<T>>) {
        self.handles.insert(id, cmd_tx);
    }

    /// Snapshot of all subscriptions, mainly for inspection in tests.
    pub fn subscriptions(&self) -> Vec<Subscription> {
        let state = self.state.lock().expect("relay lock poisoned");
        state.subscriptions.iter().cloned().collect()
    }

    /// Republish a newly observed inbound track to every other current
    /// member of the source's room.
    pub async fn publish(&self, source: ConnectionId, track: T) {
        let mut forwards = Vec::new();
        {
            let mut state = self.state.lock().expect("relay lock poisoned");

            // Membership is read under the state lock: a concurrent joiner
            // either appears in this member list, or its sync (also behind
            // the state lock) already sees the track in `published`.
            let members = match self.registry.room_of(&source) {
                Some(room) => self.registry.members_of(&room),
                None => {
                    warn!(connection = %source, track = %track.id(), "track from connection outside any room");
                    Vec::new()
                }
            };

            let published = state.published.entry(source).or_default();
            if !published.iter().any(|t| t.id() == track.id()) {
                published.push(track.clone());
            }

            for member in members {
                if member == source {
                    continue;
                }
                let subscription = Subscription {
                    source,
                    track: track.id().clone(),
                    destination: member,
                };
                if state.subscriptions.insert(subscription) {
                    forwards.push((
                        member,
                        ConnectionCommand::AddTrack {
                            source,
                            track: track.clone(),
                        },
                    ));
                } else {
                    debug!(connection = %source, track = %track.id(), destination = %member, "duplicate publish, skipping");
                }
            }
        }

        info!(connection = %source, track = %track.id(), destinations = forwards.len(), "forwarding track");
        for (destination, cmd) in forwards {
            self.send_to(destination, cmd).await;
        }
    }

    /// Wire a newly joined member up to every track already flowing in its
    /// room.
    pub async fn sync_new_member(&self, joiner: ConnectionId, peers: &[ConnectionId]) {
        let mut forwards = Vec::new();
        {
            let mut state = self.state.lock().expect("relay lock poisoned");
            for peer in peers {
                let tracks = match state.published.get(peer) {
                    Some(tracks) => tracks.clone(),
                    None => continue,
                };
                for track in tracks {
                    let subscription = Subscription {
                        source: *peer,
                        track: track.id().clone(),
                        destination: joiner,
                    };
                    if state.subscriptions.insert(subscription) {
                        forwards.push(ConnectionCommand::AddTrack {
                            source: *peer,
                            track,
                        });
                    }
                }
            }
        }

        if !forwards.is_empty() {
            info!(connection = %joiner, tracks = forwards.len(), "syncing existing tracks to late joiner");
        }
        for cmd in forwards {
            self.send_to(joiner, cmd).await;
        }
    }

    /// A source's track stopped producing: drop its subscriptions and ask
    /// each destination to renegotiate it away.
    pub async fn end_track(&self, source: ConnectionId, track_id: &TrackId) {
        let removed = {
            let mut state = self.state.lock().expect("relay lock poisoned");
            if let Some(tracks) = state.published.get_mut(&source) {
                tracks.retain(|t| t.id() != track_id);
            }
            drain_subscriptions(&mut state.subscriptions, |s| {
                s.source == source && s.track == *track_id
            })
        };

        for subscription in removed {
            self.send_to(
                subscription.destination,
                ConnectionCommand::RemoveTrack {
                    track_id: subscription.track,
                },
            )
            .await;
        }
    }

    /// Tear down everything the connection was part of, as source or
    /// destination.
    pub async fn remove_connection(&self, id: ConnectionId) {
        self.handles.remove(&id);

        let (removed, stale_sources) = {
            let mut state = self.state.lock().expect("relay lock poisoned");
            state.published.remove(&id);

            let outgoing = drain_subscriptions(&mut state.subscriptions, |s| s.source == id);
            let incoming = drain_subscriptions(&mut state.subscriptions, |s| s.destination == id);

            // Sources that just lost this destination get a refresh offer.
            let sources: HashSet<ConnectionId> =
                incoming.into_iter().map(|s| s.source).collect();
            (outgoing, sources)
        };

        debug!(connection = %id, removals = removed.len(), "removed connection from relay");
        for subscription in removed {
            self.send_to(
                subscription.destination,
                ConnectionCommand::RemoveTrack {
                    track_id: subscription.track,
                },
            )
            .await;
        }
        for source in stale_sources {
            self.send_to(source, ConnectionCommand::Renegotiate).await;
        }
    }

    /// Best-effort delivery: an unreachable destination is logged and
    /// skipped, never escalated.
    async fn send_to(&self, destination: ConnectionId, cmd: ConnectionCommand<T>) {
        if let Err(err) = self.try_send(destination, cmd).await {
            debug!(%destination, %err, "skipping relay command");
        }
    }

    async fn try_send(
        &self,
        destination: ConnectionId,
        cmd: ConnectionCommand<T>,
    ) -> Result<(), SignalingError> {
        let tx = self
            .handles
            .get(&destination)
            .map(|h| h.value().clone())
            .ok_or(SignalingError::PeerUnreachable)?;
        tx.send(cmd)
            .await
            .map_err(|_| SignalingError::PeerUnreachable)
    }
}

fn drain_subscriptions<F>(
    subscriptions: &mut HashSet<Subscription>,
    predicate: F,
) -> Vec<Subscription>
where
    F: Fn(&Subscription) -> bool,
{
    let drained: Vec<Subscription> = subscriptions
        .iter()
        .filter(|s| predicate(s))
        .cloned()
        .collect();
    for s in &drained {
        subscriptions.remove(s);
    }
    drained
}
