pub mod events;
pub mod pubsub;
pub mod registry;
pub mod session;

pub use events::{ClientEvent, ServerEvent};
pub use pubsub::RedisRelay;
pub use registry::{ConnectionId, ConnectionRegistry, Room};

use crate::metrics;
use std::sync::Arc;

/// Best-effort publisher used by the services
///
/// Publishing never blocks the caller on remote I/O and never fails: frames go
/// to local subscribers immediately and the Redis relay runs on its own task.
#[derive(Clone)]
pub struct DeliveryChannel {
    registry: ConnectionRegistry,
    relay: Option<RedisRelay>,
}

impl DeliveryChannel {
    pub fn new(registry: ConnectionRegistry, relay: Option<RedisRelay>) -> Self {
        Self { registry, relay }
    }

    pub fn local(registry: ConnectionRegistry) -> Self {
        Self::new(registry, None)
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub async fn publish(&self, room: Room, event: &ServerEvent) -> usize {
        self.publish_except(room, None, event).await
    }

    /// Publish to `room`, skipping the `exclude` connection locally.
    /// Returns how many local connections received the frame.
    pub async fn publish_except(
        &self,
        room: Room,
        exclude: Option<ConnectionId>,
        event: &ServerEvent,
    ) -> usize {
        let frame = match event.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, event = event.name(), "failed to encode delivery event");
                return 0;
            }
        };
        metrics::record_delivery_event(event.name());

        if let Some(relay) = &self.relay {
            let relay = relay.clone();
            let payload = frame.clone();
            tokio::spawn(async move {
                if let Err(e) = relay.publish(room, &payload).await {
                    tracing::warn!(error = %e, room = %room, "redis relay publish failed");
                }
            });
        }

        let delivered = self
            .registry
            .publish_except(room, exclude, Arc::from(frame))
            .await;
        tracing::debug!(room = %room, event = event.name(), delivered, "delivery event published");
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_local_channel_delivers_serialized_frame() {
        let registry = ConnectionRegistry::new();
        let channel = DeliveryChannel::local(registry.clone());
        let user = Uuid::new_v4();
        let (id, mut rx) = registry.connect().await;
        registry.join(id, Room::User(user)).await;

        let delivered = channel
            .publish(Room::User(user), &ServerEvent::error("nope"))
            .await;

        assert_eq!(delivered, 1);
        let frame: serde_json::Value =
            serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(frame["event"], "error");
        assert_eq!(frame["data"]["message"], "nope");
    }

    #[tokio::test]
    async fn test_publish_to_empty_room_is_not_an_error() {
        let channel = DeliveryChannel::local(ConnectionRegistry::new());
        let delivered = channel
            .publish(Room::Conversation(Uuid::new_v4()), &ServerEvent::error("x"))
            .await;
        assert_eq!(delivered, 0);
    }
}
