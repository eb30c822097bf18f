mod common;

use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use common::{cast, mint_token, mint_token_with_role, test_state};
use messaging_service::middleware::JwtValidator;
use messaging_service::models::Principal;
use messaging_service::routes;
use serde_json::{json, Value};
use uuid::Uuid;

macro_rules! test_app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state.clone()))
                .app_data(web::Data::new(JwtValidator::new(common::TEST_SECRET, 0)))
                .route("/health", web::get().to(routes::health::health))
                .configure(routes::configure_routes),
        )
        .await
    };
}

fn bearer(principal: &Principal) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", mint_token(principal)))
}

fn direct_with(other: &Principal) -> Value {
    json!({
        "participantId": other.id,
        "participantType": other.role.as_str(),
        "participantName": other.name,
        "type": "direct",
    })
}

#[actix_rt::test]
async fn test_health_reports_storage_backend() {
    let state = test_state();
    let app = test_app!(state);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "healthy");
    assert_eq!(body["data"]["storage"], "memory");
}

#[actix_rt::test]
async fn test_requests_without_valid_identity_are_rejected() {
    let state = test_state();
    let c = cast();
    let app = test_app!(state);

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/v1/conversations")
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "TOKEN_MISSING");
    assert!(body["timestamp"].is_string());

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/v1/conversations")
            .insert_header(("Authorization", "Bearer not-a-jwt"))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "TOKEN_INVALID");

    // The system identity never authenticates
    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/v1/conversations")
            .insert_header((
                "Authorization",
                format!("Bearer {}", mint_token_with_role(&c.admin, "system")),
            ))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_rt::test]
async fn test_conversation_and_message_round_trip() {
    let state = test_state();
    let c = cast();
    let app = test_app!(state);

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/conversations")
            .insert_header(bearer(&c.teacher))
            .set_json(direct_with(&c.parent))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Conversation retrieved/created successfully");
    let conversation_id = body["data"]["id"].as_str().unwrap().to_string();

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri(&format!("/api/v1/conversations/{conversation_id}/messages"))
            .insert_header(bearer(&c.teacher))
            .set_json(json!({ "content": "Hello" }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["content"], "Hello");
    assert_eq!(body["data"]["type"], "text");
    assert_eq!(body["data"]["sender"]["userId"], c.teacher.id.to_string());

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/v1/conversations")
            .insert_header(bearer(&c.parent))
            .to_request(),
    )
    .await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"][0]["unreadCount"], 1);
    assert_eq!(body["pagination"]["total"], 1);

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri(&format!(
                "/api/v1/conversations/{conversation_id}/messages?page=1&limit=10"
            ))
            .insert_header(bearer(&c.parent))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(
        body["pagination"],
        json!({
            "current": 1,
            "pages": 1,
            "count": 1,
            "total": 1,
            "hasNext": false,
            "hasPrev": false,
            "next": null,
            "prev": null,
        })
    );
    assert_eq!(
        body["data"][0]["readBy"][0]["userId"],
        c.parent.id.to_string()
    );

    // Outsiders get the same answer as for a missing conversation
    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri(&format!("/api/v1/conversations/{conversation_id}/messages"))
            .insert_header(bearer(&c.outsider))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Conversation not found or access denied");
}

#[actix_rt::test]
async fn test_malformed_input_is_a_bad_request() {
    let state = test_state();
    let c = cast();
    let app = test_app!(state);

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/v1/messages/search")
            .insert_header(bearer(&c.parent))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Search query is required");

    let resp = test::call_service(
        &app,
        test::TestRequest::put()
            .uri("/api/v1/messages/not-a-uuid")
            .insert_header(bearer(&c.parent))
            .set_json(json!({ "content": "edit" }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/conversations")
            .insert_header(bearer(&c.parent))
            .set_json(json!({ "participantId": Uuid::new_v4() }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
}

#[actix_rt::test]
async fn test_edit_by_non_author_is_not_found() {
    let state = test_state();
    let c = cast();
    let app = test_app!(state);

    let conversation = state
        .conversations
        .get_or_create(
            &c.teacher,
            common::start_with(&c.parent, messaging_service::models::ConversationType::Direct),
        )
        .await
        .unwrap();
    let message = state
        .messages
        .send(
            &c.teacher,
            conversation.id,
            messaging_service::services::SendMessage {
                content: "Grades are posted".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let resp = test::call_service(
        &app,
        test::TestRequest::put()
            .uri(&format!("/api/v1/messages/{}", message.id))
            .insert_header(bearer(&c.parent))
            .set_json(json!({ "content": "Grades are great" }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = test::call_service(
        &app,
        test::TestRequest::put()
            .uri(&format!("/api/v1/messages/{}", message.id))
            .insert_header(bearer(&c.teacher))
            .set_json(json!({ "content": "Grades are posted online" }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["edited"], true);

    let resp = test::call_service(
        &app,
        test::TestRequest::delete()
            .uri(&format!("/api/v1/messages/{}", message.id))
            .insert_header(bearer(&c.teacher))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Message deleted successfully");
    assert!(body["data"].is_null());
}

#[actix_rt::test]
async fn test_notification_admin_routes_are_gated() {
    let state = test_state();
    let c = cast();
    let app = test_app!(state);

    let payload = json!({
        "recipients": [
            { "userId": c.parent.id, "userType": "parent" },
            { "userId": "bogus", "userType": "parent" },
        ],
        "title": "Sports day",
        "message": "Bring water and a hat",
        "type": "announcement",
    });

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/notifications/broadcast")
            .insert_header(bearer(&c.teacher))
            .set_json(&payload)
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/notifications/broadcast")
            .insert_header(bearer(&c.admin))
            .set_json(&payload)
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["count"], 1);
    assert_eq!(body["data"]["failed"][0]["index"], 1);

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/v1/notifications/stats")
            .insert_header(bearer(&c.parent))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/v1/notifications/unread-count")
            .insert_header(bearer(&c.parent))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["unreadCount"], 1);

    let resp = test::call_service(
        &app,
        test::TestRequest::put()
            .uri("/api/v1/notifications/read-all")
            .insert_header(bearer(&c.parent))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["modifiedCount"], 1);
}

#[actix_rt::test]
async fn test_websocket_handshake_requires_token() {
    let state = test_state();
    let app = test_app!(state);

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/ws")
            .insert_header(("Connection", "Upgrade"))
            .insert_header(("Upgrade", "websocket"))
            .insert_header(("Sec-WebSocket-Version", "13"))
            .insert_header(("Sec-WebSocket-Key", "dGhlIHNhbXBsZSBub25jZQ=="))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(state.registry.connection_count().await, 0);
}
