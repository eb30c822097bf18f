#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use messaging_service::config::{
    AppConfig, AuthConfig, Config, NotificationConfig, RedisConfig, StorageBackend, StorageConfig,
    WebSocketConfig,
};
use messaging_service::error::{AppError, AppResult};
use messaging_service::middleware::Claims;
use messaging_service::models::{
    Conversation, ConversationType, NewConversation, NewNotification, Notification,
    NotificationFilter, NotificationStats, Page, PageRequest, Principal, UserKind, UserRef,
};
use messaging_service::repository::{ConversationRepository, NotificationRepository, Repositories};
use messaging_service::services::StartConversation;
use messaging_service::state::AppState;
use messaging_service::websocket::{ConnectionRegistry, DeliveryChannel};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub const TEST_SECRET: &str = "test-secret-at-least-16-chars";

pub fn test_config() -> Config {
    Config {
        app: AppConfig {
            env: "test".to_string(),
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        storage: StorageConfig {
            backend: StorageBackend::Memory,
            database: None,
        },
        redis: RedisConfig::default(),
        auth: AuthConfig {
            jwt_secret: TEST_SECRET.to_string(),
            leeway_secs: 0,
        },
        notifications: NotificationConfig::default(),
        websocket: WebSocketConfig::default(),
    }
}

/// Memory-backed state with a local-only delivery channel
pub fn test_state() -> AppState {
    test_state_with(Repositories::in_memory())
}

pub fn test_state_with(repos: Repositories) -> AppState {
    let channel = DeliveryChannel::local(ConnectionRegistry::new());
    AppState::new(Arc::new(test_config()), repos, channel)
}

pub fn principal(role: UserKind, name: &str, school_id: Uuid) -> Principal {
    Principal {
        id: Uuid::new_v4(),
        role,
        name: name.to_string(),
        school_id,
    }
}

/// A teacher, a parent and an admin from the same school
pub struct Cast {
    pub teacher: Principal,
    pub parent: Principal,
    pub admin: Principal,
    pub outsider: Principal,
}

pub fn cast() -> Cast {
    let school = Uuid::new_v4();
    Cast {
        teacher: principal(UserKind::Teacher, "Ms. Okafor", school),
        parent: principal(UserKind::Parent, "Dana Reyes", school),
        admin: principal(UserKind::Admin, "Principal Haddad", school),
        outsider: principal(UserKind::Student, "Sam Lee", school),
    }
}

pub fn start_with(other: &Principal, conversation_type: ConversationType) -> StartConversation {
    StartConversation {
        participant_id: other.id,
        participant_type: other.role,
        participant_name: other.name.clone(),
        participant_role: None,
        conversation_type,
        subject: None,
    }
}

pub fn mint_token(principal: &Principal) -> String {
    mint_token_with_role(principal, principal.role.as_str())
}

pub fn mint_token_with_role(principal: &Principal, role: &str) -> String {
    let claims = Claims {
        id: principal.id,
        role: role.to_string(),
        name: principal.name.clone(),
        school_id: principal.school_id,
        exp: chrono::Utc::now().timestamp() + 3600,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .expect("failed to sign test token")
}

/// Conversation store whose participant lookup takes `delay`
pub struct SlowParticipantLookup {
    pub inner: Arc<dyn ConversationRepository>,
    pub delay: Duration,
}

#[async_trait]
impl ConversationRepository for SlowParticipantLookup {
    async fn find_or_create(&self, new: NewConversation) -> AppResult<Conversation> {
        self.inner.find_or_create(new).await
    }

    async fn create(&self, new: NewConversation) -> AppResult<Conversation> {
        self.inner.create(new).await
    }

    async fn find_for_participant(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<Option<Conversation>> {
        tokio::time::sleep(self.delay).await;
        self.inner.find_for_participant(conversation_id, user_id).await
    }

    async fn list_active(&self, user_id: Uuid, page: PageRequest) -> AppResult<Page<Conversation>> {
        self.inner.list_active(user_id, page).await
    }

    async fn ids_for_participant(&self, user_id: Uuid) -> AppResult<Vec<Uuid>> {
        self.inner.ids_for_participant(user_id).await
    }

    async fn touch_last_message(
        &self,
        conversation_id: Uuid,
        message_id: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        self.inner.touch_last_message(conversation_id, message_id, at).await
    }
}

/// Notification store that refuses every insert
pub struct FailingNotificationInserts {
    pub inner: Arc<dyn NotificationRepository>,
}

#[async_trait]
impl NotificationRepository for FailingNotificationInserts {
    async fn insert(&self, _new: NewNotification) -> AppResult<Notification> {
        Err(AppError::Database("notification store unavailable".to_string()))
    }

    async fn list(
        &self,
        recipient: UserRef,
        filter: NotificationFilter,
        now: DateTime<Utc>,
        page: PageRequest,
    ) -> AppResult<Page<Notification>> {
        self.inner.list(recipient, filter, now, page).await
    }

    async fn mark_read(
        &self,
        notification_id: Uuid,
        recipient: UserRef,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Notification>> {
        self.inner.mark_read(notification_id, recipient, now).await
    }

    async fn mark_all_read(&self, recipient: UserRef, now: DateTime<Utc>) -> AppResult<u64> {
        self.inner.mark_all_read(recipient, now).await
    }

    async fn count_unread(&self, recipient: UserRef, now: DateTime<Utc>) -> AppResult<u64> {
        self.inner.count_unread(recipient, now).await
    }

    async fn delete(&self, notification_id: Uuid, recipient: UserRef) -> AppResult<bool> {
        self.inner.delete(notification_id, recipient).await
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> AppResult<u64> {
        self.inner.purge_expired(now).await
    }

    async fn stats(&self, school_id: Uuid, since: DateTime<Utc>) -> AppResult<NotificationStats> {
        self.inner.stats(school_id, since).await
    }
}
