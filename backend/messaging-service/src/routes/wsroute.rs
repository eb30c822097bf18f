use crate::error::AppError;
use crate::middleware::auth::{authenticate, bearer_token};
use crate::state::AppState;
use crate::websocket::session::WsSession;
use crate::websocket::Room;
use actix_web::{web, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
}

/// GET /ws?token=...
///
/// The handshake is refused with 401 unless the token verifies. Accepted
/// connections start out joined to their own `user_{id}` room.
pub async fn ws_handler(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
    query: web::Query<WsParams>,
) -> Result<HttpResponse, AppError> {
    let token = query.into_inner().token.or_else(|| bearer_token(&req));
    let principal = authenticate(&req, token)?;

    let (connection_id, frames) = state.registry.connect().await;
    state
        .registry
        .join(connection_id, Room::User(principal.id))
        .await;

    let ws_config = &state.config.websocket;
    let session = WsSession::new(
        connection_id,
        principal,
        state.conversations.clone(),
        state.channel.clone(),
        frames,
        ws_config.heartbeat_interval(),
        ws_config.client_timeout(),
    );

    match ws::start(session, &req, stream) {
        Ok(response) => Ok(response),
        Err(e) => {
            tracing::warn!(error = %e, "websocket handshake failed");
            state.registry.disconnect(connection_id).await;
            Err(AppError::BadRequest(format!("WebSocket handshake failed: {e}")))
        }
    }
}
