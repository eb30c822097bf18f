use crate::models::{Page, Pagination};
use actix_web::{http::StatusCode, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// `{success, message, data, timestamp}`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
    pub timestamp: DateTime<Utc>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(message: impl Into<String>, data: Option<T>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
            timestamp: Utc::now(),
        }
    }
}

/// List envelope with page metadata
#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    pub data: Vec<T>,
    pub pagination: Pagination,
    pub timestamp: DateTime<Utc>,
}

pub fn ok<T: Serialize>(message: &str, data: T) -> HttpResponse {
    with_status(StatusCode::OK, message, Some(data))
}

pub fn created<T: Serialize>(message: &str, data: T) -> HttpResponse {
    with_status(StatusCode::CREATED, message, Some(data))
}

/// Success without a payload (`data: null`)
pub fn ok_empty(message: &str) -> HttpResponse {
    with_status::<()>(StatusCode::OK, message, None)
}

pub fn paginated<T: Serialize>(message: &str, page: Page<T>) -> HttpResponse {
    let pagination = page.pagination();
    HttpResponse::Ok().json(PaginatedResponse {
        success: true,
        message: message.to_string(),
        data: page.items,
        pagination,
        timestamp: Utc::now(),
    })
}

fn with_status<T: Serialize>(status: StatusCode, message: &str, data: Option<T>) -> HttpResponse {
    HttpResponse::build(status).json(ApiResponse::new(message, data))
}
