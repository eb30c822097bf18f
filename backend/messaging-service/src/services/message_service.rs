//! Message send / edit / delete / read and the side effects that follow
//!
//! The persisted message is the outcome of every mutating call. Conversation
//! bookkeeping, notifications and live events run afterwards, and a failure in
//! any of them is logged and swallowed.

use super::conversation_service::{participant_from, ConversationService};
use super::notification_service::{NotificationDraft, NotificationService};
use crate::error::{AppError, AppResult};
use crate::metrics;
use crate::models::{
    preview, Attachment, Conversation, Message, MessageStats, MessageType, NewMessage,
    NotificationSender, NotificationType, Page, PageRequest, Principal,
};
use crate::repository::MessageRepository;
use crate::websocket::{DeliveryChannel, Room, ServerEvent};
use chrono::{Duration, Utc};
use futures::future::join_all;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

const STATS_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone, Default)]
pub struct SendMessage {
    pub content: String,
    pub message_type: MessageType,
    pub attachments: Vec<Attachment>,
}

#[derive(Clone)]
pub struct MessageService {
    conversations: ConversationService,
    messages: Arc<dyn MessageRepository>,
    notifications: NotificationService,
    channel: DeliveryChannel,
}

impl MessageService {
    pub fn new(
        conversations: ConversationService,
        messages: Arc<dyn MessageRepository>,
        notifications: NotificationService,
        channel: DeliveryChannel,
    ) -> Self {
        Self {
            conversations,
            messages,
            notifications,
            channel,
        }
    }

    /// Page 1 holds the newest messages, returned oldest first. Everything the
    /// caller has not read yet is marked read before the page is loaded.
    pub async fn get_messages(
        &self,
        principal: &Principal,
        conversation_id: Uuid,
        page: PageRequest,
    ) -> AppResult<Page<Message>> {
        self.conversations
            .require_participant(conversation_id, principal.id)
            .await?;
        self.messages
            .mark_read(conversation_id, principal.user_ref(), Utc::now())
            .await?;

        let mut page = self.messages.list_page(conversation_id, page).await?;
        page.items.reverse();
        Ok(page)
    }

    pub async fn send(
        &self,
        principal: &Principal,
        conversation_id: Uuid,
        request: SendMessage,
    ) -> AppResult<Message> {
        let content = required_content(&request.content)?;
        let conversation = self
            .conversations
            .require_participant(conversation_id, principal.id)
            .await?;

        let sender = conversation
            .participants
            .iter()
            .find(|p| p.user_id == principal.id)
            .cloned()
            .unwrap_or_else(|| participant_from(principal));

        let message = self
            .messages
            .insert(NewMessage {
                conversation_id,
                sender,
                content,
                message_type: request.message_type,
                attachments: request.attachments,
                school_id: principal.school_id,
            })
            .await?;
        metrics::record_message_sent();
        debug!(message_id = %message.id, conversation_id = %conversation_id, "message persisted");

        if let Err(e) = self
            .conversations
            .touch_last_message(conversation_id, message.id, message.created_at)
            .await
        {
            warn!(conversation_id = %conversation_id, error = %e, "failed to update last message");
        }

        self.notify_recipients(principal, &conversation, &message).await;
        self.push_new_message(principal, &conversation, &message).await;
        Ok(message)
    }

    pub async fn edit(
        &self,
        principal: &Principal,
        message_id: Uuid,
        content: &str,
    ) -> AppResult<Message> {
        let content = required_content(content)?;
        let message = self
            .messages
            .update_content(message_id, principal.id, &content, Utc::now())
            .await?
            .ok_or(AppError::NotFoundOrForbidden("Message"))?;

        let edited_at = message.edited_at.unwrap_or(message.updated_at);
        self.channel
            .publish(
                Room::Conversation(message.conversation_id),
                &ServerEvent::MessageEdited {
                    conversation_id: message.conversation_id,
                    message_id: message.id,
                    content: message.content.clone(),
                    edited_at,
                },
            )
            .await;
        Ok(message)
    }

    pub async fn delete(&self, principal: &Principal, message_id: Uuid) -> AppResult<Message> {
        let message = self
            .messages
            .soft_delete(message_id, principal.id, Utc::now())
            .await?
            .ok_or(AppError::NotFoundOrForbidden("Message"))?;

        let deleted_at = message.deleted_at.unwrap_or(message.updated_at);
        self.channel
            .publish(
                Room::Conversation(message.conversation_id),
                &ServerEvent::MessageDeleted {
                    conversation_id: message.conversation_id,
                    message_id: message.id,
                    deleted_at,
                },
            )
            .await;
        Ok(message)
    }

    /// Returns how many receipts were added
    pub async fn mark_as_read(&self, principal: &Principal, conversation_id: Uuid) -> AppResult<u64> {
        self.conversations
            .require_participant(conversation_id, principal.id)
            .await?;
        self.messages
            .mark_read(conversation_id, principal.user_ref(), Utc::now())
            .await
    }

    pub async fn search(
        &self,
        principal: &Principal,
        query: &str,
        conversation_id: Option<Uuid>,
        page: PageRequest,
    ) -> AppResult<Page<Message>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::BadRequest("Search query is required".to_string()));
        }

        let scope = match conversation_id {
            Some(id) => {
                self.conversations
                    .require_participant(id, principal.id)
                    .await?;
                vec![id]
            }
            None => {
                self.conversations
                    .participant_conversation_ids(principal.id)
                    .await?
            }
        };
        if scope.is_empty() {
            return Ok(Page::new(Vec::new(), 0, page));
        }
        self.messages.search(&scope, query, page).await
    }

    pub async fn stats(&self, principal: &Principal) -> AppResult<MessageStats> {
        let since = Utc::now() - Duration::days(STATS_WINDOW_DAYS);
        let daily_stats = self
            .messages
            .daily_counts(principal.school_id, since)
            .await?;

        let conversation_ids = self
            .conversations
            .participant_conversation_ids(principal.id)
            .await?;
        let unread_count = if conversation_ids.is_empty() {
            0
        } else {
            self.messages
                .count_unread(&conversation_ids, principal.id)
                .await?
        };

        Ok(MessageStats {
            daily_stats,
            unread_count,
        })
    }

    async fn notify_recipients(
        &self,
        principal: &Principal,
        conversation: &Conversation,
        message: &Message,
    ) {
        let body = format!("{} sent you a message: {}", principal.name, preview(&message.content));
        let drafts = conversation
            .other_participants(principal.id)
            .map(|recipient| NotificationDraft {
                recipient: recipient.user_ref(),
                sender: NotificationSender::user(principal.id, principal.role, &principal.name),
                title: "New Message".to_string(),
                message: body.clone(),
                notification_type: NotificationType::MessageReceived,
                priority: None,
                action_url: Some(format!("/messages/{}", conversation.id)),
                action_data: Some(json!({
                    "conversationId": conversation.id,
                    "messageId": message.id,
                })),
                expires_at: None,
                school_id: principal.school_id,
            })
            .collect::<Vec<_>>();

        let results = join_all(drafts.into_iter().map(|draft| {
            let recipient = draft.recipient.user_id;
            async move { (recipient, self.notifications.create(draft).await) }
        }))
        .await;

        for (recipient, result) in results {
            if let Err(e) = result {
                warn!(
                    message_id = %message.id,
                    recipient = %recipient,
                    error = %e,
                    "message notification failed"
                );
            }
        }
    }

    async fn push_new_message(
        &self,
        principal: &Principal,
        conversation: &Conversation,
        message: &Message,
    ) {
        let event = ServerEvent::NewMessage {
            conversation_id: conversation.id,
            message: message.clone(),
        };
        for recipient in conversation.other_participants(principal.id) {
            self.channel.publish(Room::User(recipient.user_id), &event).await;
        }
    }
}

fn required_content(content: &str) -> AppResult<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation {
            message: "Validation failed".to_string(),
            errors: vec!["content: must not be empty".to_string()],
        });
    }
    Ok(trimmed.to_string())
}
