use super::response;
use crate::error::AppError;
use crate::middleware::AuthenticatedUser;
use crate::models::PageRequest;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

const SEARCH_PAGE_SIZE: u32 = 20;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub query: Option<String>,
    pub conversation_id: Option<Uuid>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct EditMessageRequest {
    #[validate(length(min = 1, max = 5000))]
    pub content: String,
}

/// GET /api/v1/messages/search
pub async fn search_messages(
    state: web::Data<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    query: web::Query<SearchQuery>,
) -> Result<HttpResponse, AppError> {
    let query = query.into_inner();
    let page = PageRequest::new(query.page, query.limit, SEARCH_PAGE_SIZE);
    let results = state
        .messages
        .search(
            &principal,
            query.query.as_deref().unwrap_or_default(),
            query.conversation_id,
            page,
        )
        .await?;
    Ok(response::paginated("Messages found", results))
}

/// GET /api/v1/messages/stats
pub async fn message_stats(
    state: web::Data<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let stats = state.messages.stats(&principal).await?;
    Ok(response::ok("Message statistics retrieved successfully", stats))
}

/// PUT /api/v1/messages/{id}
pub async fn edit_message(
    state: web::Data<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    path: web::Path<Uuid>,
    body: web::Json<EditMessageRequest>,
) -> Result<HttpResponse, AppError> {
    body.validate()?;
    let message = state
        .messages
        .edit(&principal, path.into_inner(), &body.content)
        .await?;
    Ok(response::ok("Message updated successfully", message))
}

/// DELETE /api/v1/messages/{id}
pub async fn delete_message(
    state: web::Data<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    state.messages.delete(&principal, path.into_inner()).await?;
    Ok(response::ok_empty("Message deleted successfully"))
}
