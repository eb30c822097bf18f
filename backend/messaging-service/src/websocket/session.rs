use crate::metrics;
use crate::models::Principal;
use crate::services::ConversationService;
use crate::websocket::events::{ClientEvent, ServerEvent};
use crate::websocket::registry::{ConnectionId, FrameReceiver, Room};
use crate::websocket::DeliveryChannel;
use actix::{Actor, ActorContext, AsyncContext, Handler, Message as ActixMessage, StreamHandler};
use actix_web_actors::ws;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

// Frame queued for this connection by the registry
#[derive(ActixMessage)]
#[rtype(result = "()")]
struct Deliver(Arc<str>);

/// One authenticated WebSocket connection
pub struct WsSession {
    connection_id: ConnectionId,
    principal: Principal,
    conversations: ConversationService,
    channel: DeliveryChannel,
    frames: Option<FrameReceiver>,
    events: Option<mpsc::UnboundedSender<ClientEvent>>,
    hb: Instant,
    heartbeat_interval: Duration,
    client_timeout: Duration,
}

impl WsSession {
    /// `connection_id` must already be registered and `frames` be its queue
    pub fn new(
        connection_id: ConnectionId,
        principal: Principal,
        conversations: ConversationService,
        channel: DeliveryChannel,
        frames: FrameReceiver,
        heartbeat_interval: Duration,
        client_timeout: Duration,
    ) -> Self {
        Self {
            connection_id,
            principal,
            conversations,
            channel,
            frames: Some(frames),
            events: None,
            hb: Instant::now(),
            heartbeat_interval,
            client_timeout,
        }
    }

    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        let timeout = self.client_timeout;
        ctx.run_interval(self.heartbeat_interval, move |act, ctx| {
            if Instant::now().duration_since(act.hb) > timeout {
                tracing::warn!(
                    user_id = %act.principal.id,
                    connection_id = %act.connection_id,
                    "WebSocket heartbeat failed, disconnecting"
                );
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    fn handle_text(&self, text: &str, ctx: &mut ws::WebsocketContext<Self>) {
        let event = match serde_json::from_str::<ClientEvent>(text) {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!(error = %e, "unparseable client event");
                if let Ok(frame) = ServerEvent::error("Unrecognised event").to_frame() {
                    ctx.text(frame);
                }
                return;
            }
        };

        let Some(events) = &self.events else {
            return;
        };
        if events.send(event).is_err() {
            tracing::warn!(connection_id = %self.connection_id, "client event worker gone");
            ctx.stop();
        }
    }
}

/// Apply client events of one connection strictly in arrival order
///
/// A `joinConversation` still waiting on the participant lookup is never
/// overtaken by a later `leaveConversation` or `typing` from the same
/// connection. The worker ends once the returned sender is dropped.
pub fn spawn_event_worker<F>(
    conversations: ConversationService,
    channel: DeliveryChannel,
    connection_id: ConnectionId,
    principal: Principal,
    reply: F,
) -> mpsc::UnboundedSender<ClientEvent>
where
    F: Fn(ServerEvent) + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<ClientEvent>();
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if let Some(response) =
                handle_client_event(&conversations, &channel, connection_id, &principal, event)
                    .await
            {
                reply(response);
            }
        }
    });
    tx
}

/// Apply one client event for `connection_id`; returns a frame to send back
/// to that connection only, if any
pub async fn handle_client_event(
    conversations: &ConversationService,
    channel: &DeliveryChannel,
    connection_id: ConnectionId,
    principal: &Principal,
    event: ClientEvent,
) -> Option<ServerEvent> {
    let registry = channel.registry();
    match event {
        ClientEvent::Join(payload) => {
            if payload.user_id != principal.id {
                return Some(ServerEvent::error("Cannot join another user's room"));
            }
            registry.join(connection_id, Room::User(principal.id)).await;
            None
        }
        ClientEvent::JoinConversation(conversation_id) => {
            match conversations
                .require_participant(conversation_id, principal.id)
                .await
            {
                Ok(_) => {
                    registry
                        .join(connection_id, Room::Conversation(conversation_id))
                        .await;
                    tracing::debug!(
                        user_id = %principal.id,
                        conversation_id = %conversation_id,
                        "joined conversation room"
                    );
                    None
                }
                Err(e) if e.status_code() >= 500 => {
                    tracing::warn!(error = %e, "conversation lookup failed during join");
                    Some(ServerEvent::error("Internal server error"))
                }
                Err(e) => Some(ServerEvent::error(e.to_string())),
            }
        }
        ClientEvent::LeaveConversation(conversation_id) => {
            registry
                .leave(connection_id, Room::Conversation(conversation_id))
                .await;
            None
        }
        ClientEvent::Typing(payload) | ClientEvent::StopTyping(payload) => {
            let is_typing = matches!(event, ClientEvent::Typing(_));
            let room = Room::Conversation(payload.conversation_id);
            if registry.is_member(connection_id, room).await {
                let typing = ServerEvent::Typing {
                    conversation_id: payload.conversation_id,
                    user_id: principal.id,
                    name: principal.name.clone(),
                    is_typing,
                };
                channel
                    .publish_except(room, Some(connection_id), &typing)
                    .await;
            }
            None
        }
    }
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!(
            user_id = %self.principal.id,
            connection_id = %self.connection_id,
            "WebSocket session started"
        );
        metrics::ws_connection_opened();
        self.hb(ctx);

        let addr = ctx.address();
        self.events = Some(spawn_event_worker(
            self.conversations.clone(),
            self.channel.clone(),
            self.connection_id,
            self.principal.clone(),
            move |response| match response.to_frame() {
                Ok(frame) => addr.do_send(Deliver(Arc::from(frame))),
                Err(e) => tracing::warn!(error = %e, "failed to encode reply"),
            },
        ));

        // Bridge the registry queue into the actor
        if let Some(mut frames) = self.frames.take() {
            let addr = ctx.address();
            actix::spawn(async move {
                while let Some(frame) = frames.recv().await {
                    addr.do_send(Deliver(frame));
                }
            });
        }
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(
            user_id = %self.principal.id,
            connection_id = %self.connection_id,
            "WebSocket session stopped"
        );
        metrics::ws_connection_closed();
        self.events = None;

        let registry = self.channel.registry().clone();
        let connection_id = self.connection_id;
        actix::spawn(async move {
            registry.disconnect(connection_id).await;
        });
    }
}

impl Handler<Deliver> for WsSession {
    type Result = ();

    fn handle(&mut self, msg: Deliver, ctx: &mut Self::Context) {
        ctx.text(msg.0.to_string());
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(text)) => {
                self.hb = Instant::now();
                self.handle_text(&text, ctx);
            }
            Ok(ws::Message::Binary(_)) => {
                tracing::warn!("Binary WebSocket messages not supported");
            }
            Ok(ws::Message::Close(reason)) => {
                tracing::info!(?reason, "WebSocket close message received");
                ctx.close(reason);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) | Ok(ws::Message::Nop) => {}
            Err(e) => {
                tracing::warn!(error = %e, "WebSocket protocol error");
                ctx.stop();
            }
        }
    }
}
