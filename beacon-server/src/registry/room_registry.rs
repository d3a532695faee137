use crate::error::SignalingError;
use beacon_core::{ConnectionId, RoomId};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tracing::{debug, info};

#[derive(Default)]
struct RegistryInner {
    rooms: HashMap<RoomId, HashSet<ConnectionId>>,
    membership: HashMap<ConnectionId, RoomId>,
}

/// In-memory room membership. Both tables live behind one lock so a join or
/// leave is atomic and every reader observes a consistent member set.
#[derive(Default)]
pub struct RoomRegistry {
    inner: Mutex<RegistryInner>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the connection to `room`, creating the room if absent. Returns
    /// the other current members so the caller can introduce the joiner.
    ///
    /// Rejoining the same room is a no-op; joining while a member of a
    /// different room fails with [`SignalingError::AlreadyInRoom`].
    pub fn join(
        &self,
        conn: ConnectionId,
        room: RoomId,
    ) -> Result<Vec<ConnectionId>, SignalingError> {
        let mut inner = self.inner.lock().expect("registry lock poisoned");

        if let Some(current) = inner.membership.get(&conn) {
            if *current != room {
                return Err(SignalingError::AlreadyInRoom(current.clone()));
            }
            debug!(%conn, %room, "rejoin of current room, no-op");
        } else {
            inner.membership.insert(conn, room.clone());
            let members = inner.rooms.entry(room.clone()).or_insert_with(|| {
                info!(%room, "creating room");
                HashSet::new()
            });
            members.insert(conn);
        }

        let members = inner
            .rooms
            .get(&room)
            .map(|m| m.iter().filter(|id| **id != conn).copied().collect())
            .unwrap_or_default();
        Ok(members)
    }

    /// Removes the connection from its current room, deleting the room if
    /// it becomes empty. Returns the prior room and its remaining members;
    /// `None` if the connection was not in a room.
    pub fn leave(&self, conn: ConnectionId) -> Option<(RoomId, Vec<ConnectionId>)> {
        let mut inner = self.inner.lock().expect("registry lock poisoned");

        let room = inner.membership.remove(&conn)?;
        let remaining = match inner.rooms.get_mut(&room) {
            Some(members) => {
                members.remove(&conn);
                if members.is_empty() {
                    inner.rooms.remove(&room);
                    info!(%room, "room is empty, deleting");
                    Vec::new()
                } else {
                    members.iter().copied().collect()
                }
            }
            None => Vec::new(),
        };
        Some((room, remaining))
    }

    /// Snapshot of the room's member set; empty if the room does not exist.
    pub fn members_of(&self, room: &RoomId) -> Vec<ConnectionId> {
        let inner = self.inner.lock().expect("registry lock poisoned");
        inner
            .rooms
            .get(room)
            .map(|m| m.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn room_of(&self, conn: &ConnectionId) -> Option<RoomId> {
        let inner = self.inner.lock().expect("registry lock poisoned");
        inner.membership.get(conn).cloned()
    }

    /// Names of all currently live rooms.
    pub fn room_names(&self) -> Vec<RoomId> {
        let inner = self.inner.lock().expect("registry lock poisoned");
        inner.rooms.keys().cloned().collect()
    }
}
