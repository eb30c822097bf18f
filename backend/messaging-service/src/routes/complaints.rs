use super::response;
use crate::error::AppError;
use crate::middleware::AuthenticatedUser;
use crate::models::{ComplaintCategory, PageQuery, Priority};
use crate::services::FileComplaint;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

const COMPLAINT_PAGE_SIZE: u32 = 20;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FileComplaintRequest {
    pub student_id: Uuid,
    pub teacher_id: Uuid,
    #[validate(length(min = 1, max = 100))]
    pub teacher_name: String,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 2000))]
    pub description: String,
    #[serde(default)]
    pub category: ComplaintCategory,
    #[serde(default)]
    pub priority: Priority,
}

/// POST /api/v1/complaints
pub async fn file_complaint(
    state: web::Data<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    body: web::Json<FileComplaintRequest>,
) -> Result<HttpResponse, AppError> {
    body.validate()?;
    let body = body.into_inner();
    let complaint = state
        .complaints
        .file(
            &principal,
            FileComplaint {
                student_id: body.student_id,
                teacher_id: body.teacher_id,
                teacher_name: body.teacher_name,
                title: body.title,
                description: body.description,
                category: body.category,
                priority: body.priority,
            },
        )
        .await?;
    Ok(response::created("Complaint created successfully", complaint))
}

/// GET /api/v1/complaints
pub async fn list_complaints(
    state: web::Data<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, AppError> {
    let page = state
        .complaints
        .list(&principal, query.resolve(COMPLAINT_PAGE_SIZE))
        .await?;
    Ok(response::paginated("Complaints retrieved successfully", page))
}
