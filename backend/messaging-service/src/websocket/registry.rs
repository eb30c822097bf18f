//! Room subscription table for live connections
//!
//! Every connection owns one outbound queue. Rooms map to the set of
//! connections currently subscribed; each connection also remembers its rooms
//! so a disconnect removes every membership in one step.
//!
//! Delivery is fire-and-forget: only connections present at publish time
//! receive the frame, and per-connection order follows publish order.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

pub type ConnectionId = Uuid;

/// Outbound queue of one connection; frames are serialized JSON
pub type FrameSender = mpsc::UnboundedSender<Arc<str>>;
pub type FrameReceiver = mpsc::UnboundedReceiver<Arc<str>>;

/// Named subscription group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Room {
    /// `user_{id}`: every connection of one identity
    User(Uuid),
    /// `conversation_{id}`: clients currently viewing a conversation
    Conversation(Uuid),
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Room::User(id) => write!(f, "user_{id}"),
            Room::Conversation(id) => write!(f, "conversation_{id}"),
        }
    }
}

impl FromStr for Room {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |raw: &str| Uuid::parse_str(raw).map_err(|e| format!("invalid room {s}: {e}"));
        if let Some(id) = s.strip_prefix("user_") {
            Ok(Room::User(parse(id)?))
        } else if let Some(id) = s.strip_prefix("conversation_") {
            Ok(Room::Conversation(parse(id)?))
        } else {
            Err(format!("unknown room: {s}"))
        }
    }
}

struct Connection {
    sender: FrameSender,
    rooms: HashSet<Room>,
}

#[derive(Default)]
struct RegistryInner {
    connections: HashMap<ConnectionId, Connection>,
    rooms: HashMap<Room, HashSet<ConnectionId>>,
}

impl RegistryInner {
    fn remove_connection(&mut self, connection_id: ConnectionId) -> bool {
        let Some(connection) = self.connections.remove(&connection_id) else {
            return false;
        };
        for room in connection.rooms {
            if let Some(members) = self.rooms.get_mut(&room) {
                members.remove(&connection_id);
                if members.is_empty() {
                    self.rooms.remove(&room);
                }
            }
        }
        true
    }
}

#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection and return its id plus outbound queue
    pub async fn connect(&self) -> (ConnectionId, FrameReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connection_id = Uuid::new_v4();
        self.inner.write().await.connections.insert(
            connection_id,
            Connection {
                sender: tx,
                rooms: HashSet::new(),
            },
        );
        (connection_id, rx)
    }

    /// Drop a connection and all of its room memberships
    pub async fn disconnect(&self, connection_id: ConnectionId) -> bool {
        self.inner.write().await.remove_connection(connection_id)
    }

    /// Returns false if the connection is unknown
    pub async fn join(&self, connection_id: ConnectionId, room: Room) -> bool {
        let mut inner = self.inner.write().await;
        let Some(connection) = inner.connections.get_mut(&connection_id) else {
            return false;
        };
        connection.rooms.insert(room);
        inner.rooms.entry(room).or_default().insert(connection_id);
        true
    }

    pub async fn leave(&self, connection_id: ConnectionId, room: Room) -> bool {
        let mut inner = self.inner.write().await;
        let was_member = inner
            .connections
            .get_mut(&connection_id)
            .is_some_and(|c| c.rooms.remove(&room));
        if let Some(members) = inner.rooms.get_mut(&room) {
            members.remove(&connection_id);
            if members.is_empty() {
                inner.rooms.remove(&room);
            }
        }
        was_member
    }

    pub async fn is_member(&self, connection_id: ConnectionId, room: Room) -> bool {
        self.inner
            .read()
            .await
            .rooms
            .get(&room)
            .is_some_and(|members| members.contains(&connection_id))
    }

    /// Send a frame to every connection in `room`; returns the number reached
    pub async fn publish(&self, room: Room, frame: Arc<str>) -> usize {
        self.publish_except(room, None, frame).await
    }

    /// Like [`publish`](Self::publish) but skips `exclude` (the originator)
    pub async fn publish_except(
        &self,
        room: Room,
        exclude: Option<ConnectionId>,
        frame: Arc<str>,
    ) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();
        {
            let inner = self.inner.read().await;
            let Some(members) = inner.rooms.get(&room) else {
                return 0;
            };
            for connection_id in members {
                if Some(*connection_id) == exclude {
                    continue;
                }
                let Some(connection) = inner.connections.get(connection_id) else {
                    continue;
                };
                if connection.sender.send(frame.clone()).is_ok() {
                    delivered += 1;
                } else {
                    closed.push(*connection_id);
                }
            }
        }

        if !closed.is_empty() {
            let mut inner = self.inner.write().await;
            for connection_id in closed {
                inner.remove_connection(connection_id);
            }
        }
        delivered
    }

    pub async fn room_size(&self, room: Room) -> usize {
        self.inner
            .read()
            .await
            .rooms
            .get(&room)
            .map_or(0, HashSet::len)
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.connections.len()
    }
}
