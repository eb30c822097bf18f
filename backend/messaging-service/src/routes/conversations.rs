use super::response;
use crate::error::AppError;
use crate::middleware::AuthenticatedUser;
use crate::models::{Attachment, ConversationType, MessageType, PageQuery, UserKind};
use crate::services::{SendMessage, StartConversation};
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

const CONVERSATION_PAGE_SIZE: u32 = 20;
const MESSAGE_PAGE_SIZE: u32 = 50;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversationRequest {
    pub participant_id: Uuid,
    pub participant_type: UserKind,
    #[validate(length(min = 1, max = 100))]
    pub participant_name: String,
    #[validate(length(max = 50))]
    pub participant_role: Option<String>,
    #[serde(default, rename = "type")]
    pub conversation_type: ConversationType,
    #[validate(length(max = 200))]
    pub subject: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    #[validate(length(min = 1, max = 5000))]
    pub content: String,
    #[serde(default, rename = "type")]
    pub message_type: MessageType,
    #[serde(default)]
    #[validate(length(max = 10))]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MarkReadResponse {
    modified_count: u64,
}

/// GET /api/v1/conversations
pub async fn list_conversations(
    state: web::Data<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, AppError> {
    let page = state
        .conversations
        .list(&principal, query.resolve(CONVERSATION_PAGE_SIZE))
        .await?;
    Ok(response::paginated("Conversations retrieved successfully", page))
}

/// POST /api/v1/conversations
pub async fn get_or_create_conversation(
    state: web::Data<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    body: web::Json<CreateConversationRequest>,
) -> Result<HttpResponse, AppError> {
    body.validate()?;
    let body = body.into_inner();
    let conversation = state
        .conversations
        .get_or_create(
            &principal,
            StartConversation {
                participant_id: body.participant_id,
                participant_type: body.participant_type,
                participant_name: body.participant_name,
                participant_role: body.participant_role,
                conversation_type: body.conversation_type,
                subject: body.subject,
            },
        )
        .await?;
    Ok(response::created(
        "Conversation retrieved/created successfully",
        conversation,
    ))
}

/// GET /api/v1/conversations/{id}/messages
pub async fn get_messages(
    state: web::Data<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    path: web::Path<Uuid>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, AppError> {
    let page = state
        .messages
        .get_messages(&principal, path.into_inner(), query.resolve(MESSAGE_PAGE_SIZE))
        .await?;
    Ok(response::paginated("Messages retrieved successfully", page))
}

/// POST /api/v1/conversations/{id}/messages
pub async fn send_message(
    state: web::Data<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    path: web::Path<Uuid>,
    body: web::Json<SendMessageRequest>,
) -> Result<HttpResponse, AppError> {
    body.validate()?;
    let body = body.into_inner();
    let message = state
        .messages
        .send(
            &principal,
            path.into_inner(),
            SendMessage {
                content: body.content,
                message_type: body.message_type,
                attachments: body.attachments,
            },
        )
        .await?;
    Ok(response::created("Message sent successfully", message))
}

/// PUT /api/v1/conversations/{id}/read
pub async fn mark_as_read(
    state: web::Data<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let modified_count = state
        .messages
        .mark_as_read(&principal, path.into_inner())
        .await?;
    Ok(response::ok(
        "Messages marked as read",
        MarkReadResponse { modified_count },
    ))
}
