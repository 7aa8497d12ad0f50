//! WebSocket connection handler.
//!
//! Provides the upgrade handler and the per-socket loop. The session token
//! is checked before the upgrade, so a rejected client never gets a socket.

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use refundly_sdk::ws::{ClientMessage, ServerMessage};
use refundly_sdk::Identity;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use super::connection::Delivery;
use super::gateway::{Gateway, GatewaySession};
use crate::state::AppState;

/// Why a frame did not reach the socket.
#[derive(Debug, thiserror::Error)]
enum FrameError {
    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("socket write failed: {0}")]
    Socket(#[from] axum::Error),
}

/// Query parameters accepted on the upgrade request.
#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    /// Session token, for clients that cannot set headers.
    pub token: Option<String>,
}

/// Extracts the bearer token from the `Authorization` header.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    scheme.eq_ignore_ascii_case("bearer").then(|| token.trim())
}

/// WebSocket upgrade handler.
///
/// Authenticates first; only a valid session is upgraded.
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<ConnectParams>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let token = bearer_token(&headers).or(params.token.as_deref());

    let identity = match state.gateway.authenticate(token).await {
        Ok(identity) => identity,
        Err(err) => {
            warn!(error = %err, "rejecting websocket handshake");
            return err.into_response();
        }
    };

    match ws {
        Ok(ws) => {
            let gateway = state.gateway.clone();
            ws.on_upgrade(move |socket| handle_connection(socket, gateway, identity))
        }
        Err(rejection) => rejection.into_response(),
    }
}

/// Handles an authenticated WebSocket connection.
async fn handle_connection(socket: WebSocket, gateway: Gateway, identity: Identity) {
    let GatewaySession {
        id,
        identity,
        replies,
        mut outbound,
    } = gateway.register(identity).await;

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // The acknowledgement goes out before anything queued since registration.
    if send_frame(&mut ws_sender, &ServerMessage::connected(&identity))
        .await
        .is_err()
    {
        gateway.disconnect(id).await;
        return;
    }

    let metrics = std::sync::Arc::clone(gateway.metrics());
    let sender_task = tokio::spawn(async move {
        while let Some(msg) = outbound.recv().await {
            match send_frame(&mut ws_sender, &msg).await {
                Ok(()) => metrics.record_message_sent(),
                Err(err @ FrameError::Encode(_)) => {
                    error!(connection_id = id, error = %err, "dropping outbound frame");
                    metrics.record_frame_failed();
                }
                Err(FrameError::Socket(_)) => break,
            }
        }
    });

    while let Some(result) = ws_receiver.next().await {
        let msg = match result {
            Ok(msg) => msg,
            Err(e) => {
                warn!(connection_id = id, error = %e, "websocket error");
                break;
            }
        };

        gateway.metrics().record_message_received();

        match msg {
            Message::Text(text) => {
                let reply = handle_text_message(text.as_str());
                if replies.try_send(reply) != Delivery::Queued {
                    debug!(connection_id = id, "reply dropped");
                }
            }
            Message::Ping(_) | Message::Pong(_) => {}
            Message::Close(_) => {
                debug!(connection_id = id, "close requested");
                break;
            }
            Message::Binary(_) => {
                let _ = replies.try_send(ServerMessage::error(
                    "BAD_REQUEST",
                    "binary frames are not supported",
                ));
            }
        }
    }

    gateway.disconnect(id).await;
    sender_task.abort();

    info!(connection_id = id, user_id = %identity.user_id, "websocket closed");
}

/// Answers a text frame from the client.
fn handle_text_message(text: &str) -> ServerMessage {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Ping) => ServerMessage::pong(),
        Err(e) => ServerMessage::error("BAD_REQUEST", format!("invalid message: {}", e)),
    }
}

fn encode_frame(msg: &ServerMessage) -> Result<Message, FrameError> {
    Ok(Message::Text(serde_json::to_string(msg)?.into()))
}

async fn send_frame(
    sink: &mut SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
) -> Result<(), FrameError> {
    sink.send(encode_frame(msg)?).await?;
    Ok(())
}
