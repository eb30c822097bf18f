pub mod complaints;
pub mod conversations;
pub mod health;
pub mod messages;
pub mod notifications;
pub mod response;
pub mod wsroute;

use crate::error::AppError;
use actix_web::web;

/// Malformed bodies, queries and path ids all surface as 400 envelopes
fn extractor_configs(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .limit(256 * 1024)
            .error_handler(|err, _req| AppError::BadRequest(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| AppError::BadRequest(err.to_string()).into()),
    )
    .app_data(
        web::PathConfig::default()
            .error_handler(|err, _req| AppError::BadRequest(err.to_string()).into()),
    );
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    extractor_configs(cfg);

    cfg.route("/ws", web::get().to(wsroute::ws_handler)).service(
        web::scope("/api/v1")
            .service(
                web::scope("/conversations")
                    .route("", web::get().to(conversations::list_conversations))
                    .route("", web::post().to(conversations::get_or_create_conversation))
                    .route("/{id}/messages", web::get().to(conversations::get_messages))
                    .route("/{id}/messages", web::post().to(conversations::send_message))
                    .route("/{id}/read", web::put().to(conversations::mark_as_read)),
            )
            .service(
                // Static segments before `{id}`
                web::scope("/messages")
                    .route("/search", web::get().to(messages::search_messages))
                    .route("/stats", web::get().to(messages::message_stats))
                    .route("/{id}", web::put().to(messages::edit_message))
                    .route("/{id}", web::delete().to(messages::delete_message)),
            )
            .service(
                web::scope("/notifications")
                    .route("", web::get().to(notifications::list_notifications))
                    .route("", web::post().to(notifications::create_notification))
                    .route("/unread-count", web::get().to(notifications::unread_count))
                    .route("/read-all", web::put().to(notifications::mark_all_as_read))
                    .route("/stats", web::get().to(notifications::notification_stats))
                    .route(
                        "/broadcast",
                        web::post().to(notifications::broadcast_notification),
                    )
                    .route("/{id}/read", web::put().to(notifications::mark_as_read))
                    .route("/{id}", web::delete().to(notifications::delete_notification)),
            )
            .service(
                web::scope("/complaints")
                    .route("", web::get().to(complaints::list_complaints))
                    .route("", web::post().to(complaints::file_complaint)),
            ),
    );
}
