//! WebSocket upgrade handler and per-connection task.
//!
//! Handles the HTTP → WebSocket upgrade and manages the connection lifecycle:
//! 1. Upgrade to WebSocket
//! 2. Validate the bearer token (`auth_failed` close on failure)
//! 3. Admit the connection into the registry
//! 4. Pump outbound frames and route inbound frames until something closes it
//! 5. Remove the connection from both registries before the task exits

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::HeaderMap,
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;

use crate::adapters::http::middleware::bearer_token;
use crate::domain::bus::CloseReason;
use crate::domain::foundation::{AuthError, ConnectionId, Identity};
use crate::ports::TokenValidator;

use super::connection::{ConnectionInbox, OutboundFrame};
use super::messages::ServerMessage;
use super::router::{FrameGuard, InboundAction, MessageRouter};

type WsSink = SplitSink<WebSocket, Message>;
type WsStream = SplitStream<WebSocket>;

/// How long to wait for the client's close reply after sending ours.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// State required for WebSocket handling.
#[derive(Clone)]
pub struct WebSocketState {
    pub router: Arc<MessageRouter>,
    pub validator: Arc<dyn TokenValidator>,
}

impl WebSocketState {
    pub fn new(router: Arc<MessageRouter>, validator: Arc<dyn TokenValidator>) -> Self {
        Self { router, validator }
    }
}

/// Query parameters accepted on the upgrade request.
#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    pub token: Option<String>,
}

/// Handle WebSocket upgrade requests.
///
/// Route: `GET /ws?token=<jwt>`
///
/// The token may also be sent as `Authorization: Bearer <jwt>`. It is
/// checked after the upgrade so that a rejection can carry the
/// `auth_failed` close code instead of a bare HTTP status.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    headers: HeaderMap,
    State(state): State<WebSocketState>,
) -> Response {
    let token = params
        .token
        .filter(|token| !token.is_empty())
        .or_else(|| bearer_token(&headers).map(str::to_string));

    ws.on_upgrade(move |socket| handle_socket(socket, token, state))
}

/// Runs for the lifetime of an upgraded socket.
async fn handle_socket(socket: WebSocket, token: Option<String>, state: WebSocketState) {
    let (mut sink, mut stream) = socket.split();
    let broker = state.router.broker().clone();

    let identity = match authenticate(state.validator.as_ref(), token.as_deref()).await {
        Ok(identity) => identity,
        Err(e) => {
            tracing::info!(error = %e, "WebSocket authentication failed");
            close_gracefully(&mut sink, &mut stream, CloseReason::AuthFailed).await;
            return;
        }
    };

    let (connection, inbox) = broker.open_connection(identity.clone());
    let id = connection.id();

    if let Err(e) = broker.admit(connection).await {
        tracing::warn!(connection_id = %id, error = %e, "Connection not admitted");
        let reason = if e.is_invariant_violation() {
            CloseReason::InternalError
        } else {
            CloseReason::ServerShutdown
        };
        close_gracefully(&mut sink, &mut stream, reason).await;
        return;
    }

    let reason = match send_message(&mut sink, &ServerMessage::connected(id, &identity)).await {
        Ok(()) => pump(id, &state.router, &mut sink, &mut stream, inbox).await,
        Err(e) => {
            tracing::debug!(connection_id = %id, error = %e, "Client left before greeting");
            CloseReason::ClientClosed
        }
    };

    broker.remove(id, reason).await;
    if reason.server_initiated() {
        close_gracefully(&mut sink, &mut stream, reason).await;
    }

    tracing::info!(
        connection_id = %id,
        user_id = %identity.user_id,
        reason = reason.as_str(),
        "Connection closed"
    );
}

async fn authenticate(
    validator: &dyn TokenValidator,
    token: Option<&str>,
) -> Result<Identity, AuthError> {
    let token = token.ok_or(AuthError::MissingToken)?;
    validator.validate(token).await
}

/// Moves frames both ways until the connection must close; returns why.
async fn pump(
    id: ConnectionId,
    router: &MessageRouter,
    sink: &mut WsSink,
    stream: &mut WsStream,
    mut inbox: ConnectionInbox,
) -> CloseReason {
    let mut guard = FrameGuard::new(router.broker().settings().max_malformed_frames);

    loop {
        tokio::select! {
            closed = &mut inbox.closed => {
                return closed.unwrap_or(CloseReason::InternalError);
            }

            Some(frame) = inbox.outbound.recv() => {
                if let Err(e) = write_frame(sink, frame).await {
                    tracing::debug!(connection_id = %id, error = %e, "Socket write failed");
                    return CloseReason::SendFailed;
                }
            }

            incoming = stream.next() => {
                let action = match incoming {
                    Some(Ok(Message::Text(text))) => router.route_text(id, &text, &mut guard).await,
                    Some(Ok(Message::Binary(_))) => router.route_binary(id, &mut guard),
                    Some(Ok(Message::Pong(_))) => {
                        if let Err(e) = router.broker().touch(id).await {
                            tracing::trace!(connection_id = %id, error = %e, "Pong from departed connection");
                        }
                        InboundAction::Ignore
                    }
                    // Answered by the transport.
                    Some(Ok(Message::Ping(_))) => InboundAction::Ignore,
                    Some(Ok(Message::Close(_))) | None => return CloseReason::ClientClosed,
                    Some(Err(e)) => {
                        tracing::debug!(connection_id = %id, error = %e, "Socket read failed");
                        return CloseReason::ClientClosed;
                    }
                };

                match action {
                    InboundAction::Reply(message) => {
                        if let Err(e) = send_message(sink, &message).await {
                            tracing::debug!(connection_id = %id, error = %e, "Reply failed");
                            return CloseReason::SendFailed;
                        }
                    }
                    InboundAction::Ignore => {}
                    InboundAction::Close { reason, notice } => {
                        if let Some(notice) = notice {
                            let _ = send_message(sink, &notice).await;
                        }
                        return reason;
                    }
                }
            }
        }
    }
}

async fn write_frame(sink: &mut WsSink, frame: OutboundFrame) -> Result<(), axum::Error> {
    match frame {
        OutboundFrame::Text(text) => sink.send(Message::Text(text.to_string())).await,
        OutboundFrame::Ping => sink.send(Message::Ping(Vec::new())).await,
    }
}

async fn send_message(sink: &mut WsSink, message: &ServerMessage) -> Result<(), axum::Error> {
    let json = message.to_json().map_err(axum::Error::new)?;
    sink.send(Message::Text(json)).await
}

async fn send_close(sink: &mut WsSink, reason: CloseReason) {
    let frame = CloseFrame {
        code: reason.code(),
        reason: Cow::Borrowed(reason.as_str()),
    };
    if let Err(e) = sink.send(Message::Close(Some(frame))).await {
        tracing::trace!(reason = reason.as_str(), error = %e, "Close frame not delivered");
    }
}

/// Sends a close frame, then reads until the client answers with its own.
///
/// Dropping the socket straight away can reset the TCP connection before a
/// client with unread frames reaches the close code.
async fn close_gracefully(sink: &mut WsSink, stream: &mut WsStream, reason: CloseReason) {
    send_close(sink, reason).await;

    let acknowledged = tokio::time::timeout(CLOSE_GRACE, async {
        while let Some(Ok(message)) = stream.next().await {
            if matches!(message, Message::Close(_)) {
                return true;
            }
        }
        false
    })
    .await;

    if !matches!(acknowledged, Ok(true)) {
        tracing::trace!(reason = reason.as_str(), "Close not acknowledged by client");
    }
}

/// Create axum router for the WebSocket endpoint.
pub fn websocket_router() -> axum::Router<WebSocketState> {
    use axum::routing::get;

    axum::Router::new().route("/ws", get(ws_handler))
}
