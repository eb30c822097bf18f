//! Notification lifecycle: create, fan-out, read state, expiry
//!
//! Persistence is the success criterion of every create. The live
//! `notification` push that follows is best-effort and never fails the call.

use crate::error::{AppError, AppResult};
use crate::metrics;
use crate::models::{
    NewNotification, Notification, NotificationFilter, NotificationSender, NotificationStats,
    NotificationType, Page, PageRequest, Principal, Priority, UserKind, UserRef,
};
use crate::repository::NotificationRepository;
use crate::websocket::{DeliveryChannel, Room, ServerEvent};
use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Window used by the per-type statistics
const STATS_WINDOW_DAYS: i64 = 30;

/// Everything a caller chooses about a new notification; the service fills in
/// defaults for priority and expiry
#[derive(Debug, Clone)]
pub struct NotificationDraft {
    pub recipient: UserRef,
    pub sender: NotificationSender,
    pub title: String,
    pub message: String,
    pub notification_type: NotificationType,
    pub priority: Option<Priority>,
    pub action_url: Option<String>,
    pub action_data: Option<serde_json::Value>,
    pub expires_at: Option<DateTime<Utc>>,
    pub school_id: Uuid,
}

/// One broadcast target as supplied by the client; parsed per entry so a bad
/// entry fails alone
#[derive(Debug, Clone)]
pub struct RecipientSpec {
    pub user_id: String,
    pub user_type: String,
}

#[derive(Debug, Clone)]
pub struct BroadcastRequest {
    pub recipients: Vec<RecipientSpec>,
    pub title: String,
    pub message: String,
    pub notification_type: NotificationType,
    pub priority: Option<Priority>,
    pub action_url: Option<String>,
    pub action_data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastFailure {
    pub index: usize,
    pub user_id: String,
    pub user_type: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BroadcastOutcome {
    pub count: usize,
    pub notifications: Vec<Notification>,
    pub failed: Vec<BroadcastFailure>,
}

#[derive(Clone)]
pub struct NotificationService {
    repo: Arc<dyn NotificationRepository>,
    channel: DeliveryChannel,
    ttl: Duration,
}

impl NotificationService {
    pub fn new(repo: Arc<dyn NotificationRepository>, channel: DeliveryChannel, ttl_days: i64) -> Self {
        Self {
            repo,
            channel,
            ttl: Duration::days(ttl_days),
        }
    }

    /// Internal create used by messaging and complaints; not role-gated
    pub async fn create(&self, draft: NotificationDraft) -> AppResult<Notification> {
        let new = self.resolve(draft, Utc::now())?;
        let notification = self.repo.insert(new).await?;
        metrics::record_notification_created(notification.notification_type.as_str());
        debug!(
            notification_id = %notification.id,
            recipient = %notification.recipient.user_id,
            notification_type = notification.notification_type.as_str(),
            "notification created"
        );
        self.push(&notification).await;
        Ok(notification)
    }

    /// Admin-only create; the caller becomes the sender
    pub async fn create_by_admin(
        &self,
        principal: &Principal,
        mut draft: NotificationDraft,
    ) -> AppResult<Notification> {
        principal.require_admin()?;
        draft.sender = NotificationSender::user(principal.id, principal.role, &principal.name);
        draft.school_id = principal.school_id;
        self.create(draft).await
    }

    /// Fan out one notification per recipient. Every entry is an independent
    /// unit of work: failures are reported per entry and never abort the rest.
    pub async fn broadcast(
        &self,
        principal: &Principal,
        request: BroadcastRequest,
    ) -> AppResult<BroadcastOutcome> {
        principal.require_admin()?;
        if request.recipients.is_empty() {
            return Err(AppError::validation("Recipients list is required"));
        }
        let title = required_text("title", &request.title)?;
        let message = required_text("message", &request.message)?;
        let sender = NotificationSender::user(principal.id, principal.role, &principal.name);

        let attempts = request.recipients.iter().enumerate().map(|(index, entry)| {
            let draft = parse_recipient(entry).map(|recipient| NotificationDraft {
                recipient,
                sender: sender.clone(),
                title: title.clone(),
                message: message.clone(),
                notification_type: request.notification_type,
                priority: request.priority,
                action_url: request.action_url.clone(),
                action_data: request.action_data.clone(),
                expires_at: None,
                school_id: principal.school_id,
            });
            async move {
                let result = match draft {
                    Ok(draft) => self.create(draft).await,
                    Err(e) => Err(e),
                };
                (index, result)
            }
        });

        let mut outcome = BroadcastOutcome {
            count: 0,
            notifications: Vec::with_capacity(request.recipients.len()),
            failed: Vec::new(),
        };
        for (index, result) in join_all(attempts).await {
            match result {
                Ok(notification) => outcome.notifications.push(notification),
                Err(e) => {
                    let entry = &request.recipients[index];
                    warn!(index, user_id = %entry.user_id, error = %e, "broadcast recipient failed");
                    outcome.failed.push(BroadcastFailure {
                        index,
                        user_id: entry.user_id.clone(),
                        user_type: entry.user_type.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        outcome.count = outcome.notifications.len();

        info!(
            sender = %principal.id,
            created = outcome.count,
            failed = outcome.failed.len(),
            "notification broadcast finished"
        );
        Ok(outcome)
    }

    pub async fn list(
        &self,
        principal: &Principal,
        filter: NotificationFilter,
        page: PageRequest,
    ) -> AppResult<Page<Notification>> {
        self.repo
            .list(principal.user_ref(), filter, Utc::now(), page)
            .await
    }

    pub async fn mark_read(&self, principal: &Principal, notification_id: Uuid) -> AppResult<Notification> {
        self.repo
            .mark_read(notification_id, principal.user_ref(), Utc::now())
            .await?
            .ok_or(AppError::NotFoundOrForbidden("Notification"))
    }

    /// Returns how many notifications changed state
    pub async fn mark_all_read(&self, principal: &Principal) -> AppResult<u64> {
        self.repo.mark_all_read(principal.user_ref(), Utc::now()).await
    }

    pub async fn unread_count(&self, principal: &Principal) -> AppResult<u64> {
        self.repo.count_unread(principal.user_ref(), Utc::now()).await
    }

    pub async fn delete(&self, principal: &Principal, notification_id: Uuid) -> AppResult<()> {
        if self.repo.delete(notification_id, principal.user_ref()).await? {
            Ok(())
        } else {
            Err(AppError::NotFoundOrForbidden("Notification"))
        }
    }

    pub async fn stats(&self, principal: &Principal) -> AppResult<NotificationStats> {
        principal.require_admin()?;
        let since = Utc::now() - Duration::days(STATS_WINDOW_DAYS);
        self.repo.stats(principal.school_id, since).await
    }

    /// Hard-delete expired notifications
    pub async fn purge_expired(&self) -> AppResult<u64> {
        let purged = self.repo.purge_expired(Utc::now()).await?;
        metrics::record_notifications_purged(purged);
        Ok(purged)
    }

    fn resolve(&self, draft: NotificationDraft, now: DateTime<Utc>) -> AppResult<NewNotification> {
        if !draft.recipient.user_type.is_role() {
            return Err(AppError::validation(format!(
                "invalid recipient type '{}'",
                draft.recipient.user_type
            )));
        }
        Ok(NewNotification {
            recipient: draft.recipient,
            sender: draft.sender,
            title: required_text("title", &draft.title)?,
            message: required_text("message", &draft.message)?,
            notification_type: draft.notification_type,
            priority: draft.priority.unwrap_or_default(),
            action_url: draft
                .action_url
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty()),
            action_data: draft.action_data,
            expires_at: draft.expires_at.unwrap_or(now + self.ttl),
            school_id: draft.school_id,
        })
    }

    async fn push(&self, notification: &Notification) {
        self.channel
            .publish(
                Room::User(notification.recipient.user_id),
                &ServerEvent::Notification(notification.clone()),
            )
            .await;
    }
}

fn required_text(field: &str, value: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation {
            message: "Validation failed".to_string(),
            errors: vec![format!("{field}: must not be empty")],
        });
    }
    Ok(trimmed.to_string())
}

fn parse_recipient(entry: &RecipientSpec) -> AppResult<UserRef> {
    let user_id = Uuid::parse_str(entry.user_id.trim())
        .map_err(|_| AppError::validation(format!("invalid recipient id '{}'", entry.user_id)))?;
    let user_type = UserKind::parse_role(&entry.user_type)?;
    Ok(UserRef::new(user_id, user_type))
}
