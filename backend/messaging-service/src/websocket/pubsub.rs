//! Cross-instance relay of delivery frames over Redis pub/sub
//!
//! Each instance tags what it publishes with its own origin id and ignores
//! envelopes carrying that id, so a frame is dispatched locally exactly once.

use crate::websocket::registry::{ConnectionRegistry, Room};
use futures::StreamExt;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

pub const RELAY_CHANNEL: &str = "messaging:rooms";

#[derive(Debug, Serialize, Deserialize)]
struct RelayEnvelope {
    origin: Uuid,
    room: String,
    payload: String,
}

#[derive(Clone)]
pub struct RedisRelay {
    client: Client,
    publisher: ConnectionManager,
    origin: Uuid,
}

impl RedisRelay {
    pub async fn connect(url: &str) -> redis::RedisResult<Self> {
        let client = Client::open(url)?;
        let publisher = ConnectionManager::new(client.clone()).await?;
        Ok(Self {
            client,
            publisher,
            origin: Uuid::new_v4(),
        })
    }

    pub fn origin(&self) -> Uuid {
        self.origin
    }

    pub async fn publish(&self, room: Room, payload: &str) -> redis::RedisResult<()> {
        let envelope = RelayEnvelope {
            origin: self.origin,
            room: room.to_string(),
            payload: payload.to_string(),
        };
        let body = serde_json::to_string(&envelope).map_err(|e| {
            redis::RedisError::from((
                redis::ErrorKind::TypeError,
                "relay envelope serialization",
                e.to_string(),
            ))
        })?;
        let mut conn = self.publisher.clone();
        conn.publish::<_, _, ()>(RELAY_CHANNEL, body).await
    }

    /// Re-dispatch foreign envelopes into the local registry until the
    /// subscription ends
    pub async fn run_listener(self, registry: ConnectionRegistry) -> redis::RedisResult<()> {
        // PubSub requires a dedicated connection, not multiplexed
        #[allow(deprecated)]
        let conn = self.client.get_async_connection().await?;
        let mut pubsub = conn.into_pubsub();
        pubsub.subscribe(RELAY_CHANNEL).await?;
        tracing::info!(channel = RELAY_CHANNEL, origin = %self.origin, "redis relay listening");

        let mut stream = pubsub.on_message();
        while let Some(msg) = stream.next().await {
            let body: String = match msg.get_payload() {
                Ok(body) => body,
                Err(e) => {
                    tracing::warn!(error = %e, "unreadable relay payload");
                    continue;
                }
            };
            let Some((room, payload)) = decode_foreign(&body, self.origin) else {
                continue;
            };
            registry.publish(room, Arc::from(payload)).await;
        }
        Ok(())
    }
}

fn decode_foreign(body: &str, origin: Uuid) -> Option<(Room, String)> {
    let envelope: RelayEnvelope = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!(error = %e, "malformed relay envelope");
            return None;
        }
    };
    if envelope.origin == origin {
        return None;
    }
    match envelope.room.parse::<Room>() {
        Ok(room) => Some((room, envelope.payload)),
        Err(e) => {
            tracing::warn!(error = %e, "relay envelope for unknown room");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(origin: Uuid, room: &str) -> String {
        serde_json::to_string(&RelayEnvelope {
            origin,
            room: room.to_string(),
            payload: r#"{"event":"typing"}"#.to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_own_envelopes_are_skipped() {
        let origin = Uuid::new_v4();
        let room = Room::User(Uuid::new_v4()).to_string();
        assert!(decode_foreign(&envelope(origin, &room), origin).is_none());
    }

    #[test]
    fn test_foreign_envelope_is_decoded() {
        let conversation = Uuid::new_v4();
        let body = envelope(Uuid::new_v4(), &format!("conversation_{conversation}"));
        let (room, payload) = decode_foreign(&body, Uuid::new_v4()).unwrap();
        assert_eq!(room, Room::Conversation(conversation));
        assert_eq!(payload, r#"{"event":"typing"}"#);
    }

    #[test]
    fn test_bad_room_or_json_is_dropped() {
        let origin = Uuid::new_v4();
        assert!(decode_foreign(&envelope(Uuid::new_v4(), "lobby"), origin).is_none());
        assert!(decode_foreign("not json", origin).is_none());
    }
}
