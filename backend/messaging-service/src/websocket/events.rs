//! Delivery channel frames
//!
//! Every frame in either direction is `{"event": <name>, "data": <payload>}`.

use crate::models::{Message, Notification};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Server to client events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    NewMessage {
        conversation_id: Uuid,
        message: Message,
    },

    #[serde(rename_all = "camelCase")]
    MessageEdited {
        conversation_id: Uuid,
        message_id: Uuid,
        content: String,
        edited_at: DateTime<Utc>,
    },

    #[serde(rename_all = "camelCase")]
    MessageDeleted {
        conversation_id: Uuid,
        message_id: Uuid,
        deleted_at: DateTime<Utc>,
    },

    /// Sent for both `typing` and `stopTyping`; `is_typing` tells them apart
    #[serde(rename_all = "camelCase")]
    Typing {
        conversation_id: Uuid,
        user_id: Uuid,
        name: String,
        is_typing: bool,
    },

    Notification(Notification),

    Error { message: String },
}

impl ServerEvent {
    /// Stable name used for metrics labels
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::NewMessage { .. } => "newMessage",
            ServerEvent::MessageEdited { .. } => "messageEdited",
            ServerEvent::MessageDeleted { .. } => "messageDeleted",
            ServerEvent::Typing { .. } => "typing",
            ServerEvent::Notification(_) => "notification",
            ServerEvent::Error { .. } => "error",
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error {
            message: message.into(),
        }
    }

    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Typing indicator payload; only `conversationId` is required
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    pub conversation_id: Uuid,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinPayload {
    pub user_id: Uuid,
}

/// Client to server events
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    Join(JoinPayload),
    JoinConversation(Uuid),
    LeaveConversation(Uuid),
    Typing(TypingPayload),
    StopTyping(TypingPayload),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_edited_frame_shape() {
        let conversation_id = Uuid::new_v4();
        let message_id = Uuid::new_v4();
        let event = ServerEvent::MessageEdited {
            conversation_id,
            message_id,
            content: "updated".to_string(),
            edited_at: Utc::now(),
        };

        let frame: serde_json::Value = serde_json::from_str(&event.to_frame().unwrap()).unwrap();
        assert_eq!(frame["event"], "messageEdited");
        assert_eq!(frame["data"]["conversationId"], conversation_id.to_string());
        assert_eq!(frame["data"]["messageId"], message_id.to_string());
        assert_eq!(frame["data"]["content"], "updated");
        assert!(frame["data"]["editedAt"].is_string());
    }

    #[test]
    fn test_typing_frame_uses_camel_case() {
        let event = ServerEvent::Typing {
            conversation_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: "Mere".to_string(),
            is_typing: false,
        };
        let frame = serde_json::to_value(&event).unwrap();
        assert_eq!(frame["event"], "typing");
        assert_eq!(frame["data"]["isTyping"], false);
        assert_eq!(event.name(), "typing");
    }

    #[test]
    fn test_parse_client_events() {
        let conversation_id = Uuid::new_v4();

        let join: ClientEvent = serde_json::from_value(json!({
            "event": "joinConversation",
            "data": conversation_id,
        }))
        .unwrap();
        assert!(matches!(join, ClientEvent::JoinConversation(id) if id == conversation_id));

        let typing: ClientEvent = serde_json::from_value(json!({
            "event": "stopTyping",
            "data": { "conversationId": conversation_id, "name": "ignored" },
        }))
        .unwrap();
        assert!(matches!(
            typing,
            ClientEvent::StopTyping(TypingPayload { conversation_id: id }) if id == conversation_id
        ));

        assert!(serde_json::from_value::<ClientEvent>(json!({ "event": "shout", "data": {} })).is_err());
    }
}
