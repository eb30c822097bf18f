//! Persistence seams for conversations, messages, notifications and complaints.
//!
//! Every mutation that can race (read receipts, edits, find-or-create) is a
//! single atomic repository call so concurrent requests never overwrite each
//! other.

pub mod memory;
pub mod postgres;

use crate::error::AppResult;
use crate::models::{
    Complaint, ComplaintScope, Conversation, DailyCount, Message, NewComplaint, NewConversation,
    NewMessage, NewNotification, Notification, NotificationFilter, NotificationStats, Page,
    PageRequest, UserRef,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

pub use memory::MemoryRepository;
pub use postgres::PgRepository;

#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Return the conversation with exactly this type and participant set,
    /// creating it if none exists. Concurrent callers converge on one row.
    async fn find_or_create(&self, new: NewConversation) -> AppResult<Conversation>;

    /// Always create a fresh conversation (complaint threads)
    async fn create(&self, new: NewConversation) -> AppResult<Conversation>;

    /// The conversation, only if `user_id` participates in it
    async fn find_for_participant(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<Option<Conversation>>;

    /// Active conversations of `user_id`, most recent activity first
    async fn list_active(&self, user_id: Uuid, page: PageRequest) -> AppResult<Page<Conversation>>;

    /// Every conversation `user_id` participates in, active or not
    async fn ids_for_participant(&self, user_id: Uuid) -> AppResult<Vec<Uuid>>;

    async fn touch_last_message(
        &self,
        conversation_id: Uuid,
        message_id: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<()>;
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn insert(&self, new: NewMessage) -> AppResult<Message>;

    async fn find(&self, message_id: Uuid) -> AppResult<Option<Message>>;

    /// Non-deleted messages, newest first
    async fn list_page(&self, conversation_id: Uuid, page: PageRequest) -> AppResult<Page<Message>>;

    /// Replace content of a live message authored by `sender_id`
    async fn update_content(
        &self,
        message_id: Uuid,
        sender_id: Uuid,
        content: &str,
        at: DateTime<Utc>,
    ) -> AppResult<Option<Message>>;

    /// Soft-delete a live message authored by `sender_id`
    async fn soft_delete(
        &self,
        message_id: Uuid,
        sender_id: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<Option<Message>>;

    /// Add `reader`'s receipt to every message they did not author and have
    /// not read yet. Returns how many receipts were added.
    async fn mark_read(
        &self,
        conversation_id: Uuid,
        reader: UserRef,
        at: DateTime<Utc>,
    ) -> AppResult<u64>;

    async fn count_unread(&self, conversation_ids: &[Uuid], user_id: Uuid) -> AppResult<u64>;

    /// Case-insensitive substring search, newest first
    async fn search(
        &self,
        conversation_ids: &[Uuid],
        query: &str,
        page: PageRequest,
    ) -> AppResult<Page<Message>>;

    /// Non-deleted messages per UTC day since `since`, ascending by day
    async fn daily_counts(&self, school_id: Uuid, since: DateTime<Utc>) -> AppResult<Vec<DailyCount>>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn insert(&self, new: NewNotification) -> AppResult<Notification>;

    /// Unexpired notifications of `recipient`, newest first
    async fn list(
        &self,
        recipient: UserRef,
        filter: NotificationFilter,
        now: DateTime<Utc>,
        page: PageRequest,
    ) -> AppResult<Page<Notification>>;

    async fn mark_read(
        &self,
        notification_id: Uuid,
        recipient: UserRef,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Notification>>;

    async fn mark_all_read(&self, recipient: UserRef, now: DateTime<Utc>) -> AppResult<u64>;

    async fn count_unread(&self, recipient: UserRef, now: DateTime<Utc>) -> AppResult<u64>;

    async fn delete(&self, notification_id: Uuid, recipient: UserRef) -> AppResult<bool>;

    /// Hard-delete everything with `expires_at <= now`
    async fn purge_expired(&self, now: DateTime<Utc>) -> AppResult<u64>;

    async fn stats(&self, school_id: Uuid, since: DateTime<Utc>) -> AppResult<NotificationStats>;
}

#[async_trait]
pub trait ComplaintRepository: Send + Sync {
    async fn insert(&self, new: NewComplaint) -> AppResult<Complaint>;

    async fn list(&self, scope: ComplaintScope, page: PageRequest) -> AppResult<Page<Complaint>>;
}

/// One handle per aggregate, usually backed by the same store
#[derive(Clone)]
pub struct Repositories {
    pub conversations: Arc<dyn ConversationRepository>,
    pub messages: Arc<dyn MessageRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub complaints: Arc<dyn ComplaintRepository>,
}

impl Repositories {
    pub fn postgres(pool: sqlx::PgPool) -> Self {
        Self::from_store(Arc::new(PgRepository::new(pool)))
    }

    pub fn in_memory() -> Self {
        Self::from_store(Arc::new(MemoryRepository::new()))
    }

    fn from_store<S>(store: Arc<S>) -> Self
    where
        S: ConversationRepository
            + MessageRepository
            + NotificationRepository
            + ComplaintRepository
            + 'static,
    {
        Self {
            conversations: store.clone(),
            messages: store.clone(),
            notifications: store.clone(),
            complaints: store,
        }
    }
}
