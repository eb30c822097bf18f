use super::response;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct HealthStatus {
    status: &'static str,
    storage: &'static str,
    connections: usize,
}

/// GET /health
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    response::ok(
        "OK",
        HealthStatus {
            status: "healthy",
            storage: state.config.storage.backend.as_str(),
            connections: state.registry.connection_count().await,
        },
    )
}
