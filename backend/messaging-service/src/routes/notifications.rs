use super::response;
use crate::error::AppError;
use crate::middleware::AuthenticatedUser;
use crate::models::{
    NotificationFilter, NotificationSender, NotificationType, PageRequest, Priority, UserKind,
    UserRef,
};
use crate::services::{BroadcastRequest, NotificationDraft, RecipientSpec};
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

const NOTIFICATION_PAGE_SIZE: u32 = 20;

#[derive(Debug, Deserialize)]
pub struct ListNotificationsQuery {
    #[serde(rename = "type")]
    pub notification_type: Option<NotificationType>,
    pub priority: Option<Priority>,
    pub read: Option<bool>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotificationRequest {
    pub recipient_id: Uuid,
    pub recipient_type: UserKind,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 1000))]
    pub message: String,
    #[serde(default, rename = "type")]
    pub notification_type: NotificationType,
    pub priority: Option<Priority>,
    #[validate(length(max = 500))]
    pub action_url: Option<String>,
    pub action_data: Option<serde_json::Value>,
}

/// Broadcast entries stay as raw strings so one malformed entry fails alone
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastRecipient {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub user_type: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastNotificationRequest {
    #[validate(length(min = 1, max = 1000))]
    pub recipients: Vec<BroadcastRecipient>,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 1000))]
    pub message: String,
    #[serde(default, rename = "type")]
    pub notification_type: NotificationType,
    pub priority: Option<Priority>,
    #[validate(length(max = 500))]
    pub action_url: Option<String>,
    pub action_data: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UnreadCountResponse {
    unread_count: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ModifiedCountResponse {
    modified_count: u64,
}

/// GET /api/v1/notifications
pub async fn list_notifications(
    state: web::Data<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    query: web::Query<ListNotificationsQuery>,
) -> Result<HttpResponse, AppError> {
    let query = query.into_inner();
    let filter = NotificationFilter {
        notification_type: query.notification_type,
        priority: query.priority,
        read: query.read,
    };
    let page = PageRequest::new(query.page, query.limit, NOTIFICATION_PAGE_SIZE);
    let notifications = state.notifications.list(&principal, filter, page).await?;
    Ok(response::paginated(
        "Notifications retrieved successfully",
        notifications,
    ))
}

/// GET /api/v1/notifications/unread-count
pub async fn unread_count(
    state: web::Data<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let unread_count = state.notifications.unread_count(&principal).await?;
    Ok(response::ok(
        "Unread count retrieved successfully",
        UnreadCountResponse { unread_count },
    ))
}

/// PUT /api/v1/notifications/read-all
pub async fn mark_all_as_read(
    state: web::Data<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let modified_count = state.notifications.mark_all_read(&principal).await?;
    Ok(response::ok(
        "All notifications marked as read",
        ModifiedCountResponse { modified_count },
    ))
}

/// PUT /api/v1/notifications/{id}/read
pub async fn mark_as_read(
    state: web::Data<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let notification = state
        .notifications
        .mark_read(&principal, path.into_inner())
        .await?;
    Ok(response::ok("Notification marked as read", notification))
}

/// DELETE /api/v1/notifications/{id}
pub async fn delete_notification(
    state: web::Data<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    state
        .notifications
        .delete(&principal, path.into_inner())
        .await?;
    Ok(response::ok_empty("Notification deleted successfully"))
}

/// POST /api/v1/notifications (admin)
pub async fn create_notification(
    state: web::Data<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    body: web::Json<CreateNotificationRequest>,
) -> Result<HttpResponse, AppError> {
    principal.require_admin()?;
    body.validate()?;
    let body = body.into_inner();
    let draft = NotificationDraft {
        recipient: UserRef::new(body.recipient_id, body.recipient_type),
        sender: NotificationSender::system(),
        title: body.title,
        message: body.message,
        notification_type: body.notification_type,
        priority: body.priority,
        action_url: body.action_url,
        action_data: body.action_data,
        expires_at: None,
        school_id: principal.school_id,
    };
    let notification = state
        .notifications
        .create_by_admin(&principal, draft)
        .await?;
    Ok(response::created(
        "Notification created successfully",
        notification,
    ))
}

/// POST /api/v1/notifications/broadcast (admin)
pub async fn broadcast_notification(
    state: web::Data<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    body: web::Json<BroadcastNotificationRequest>,
) -> Result<HttpResponse, AppError> {
    principal.require_admin()?;
    body.validate()?;
    let body = body.into_inner();
    let outcome = state
        .notifications
        .broadcast(
            &principal,
            BroadcastRequest {
                recipients: body
                    .recipients
                    .into_iter()
                    .map(|r| RecipientSpec {
                        user_id: r.user_id,
                        user_type: r.user_type,
                    })
                    .collect(),
                title: body.title,
                message: body.message,
                notification_type: body.notification_type,
                priority: body.priority,
                action_url: body.action_url,
                action_data: body.action_data,
            },
        )
        .await?;
    Ok(response::created(
        "Notifications broadcasted successfully",
        outcome,
    ))
}

/// GET /api/v1/notifications/stats (admin)
pub async fn notification_stats(
    state: web::Data<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let stats = state.notifications.stats(&principal).await?;
    Ok(response::ok(
        "Notification statistics retrieved successfully",
        stats,
    ))
}
