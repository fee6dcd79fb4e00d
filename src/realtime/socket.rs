//! WebSocket endpoint binding a live client to the connection registry.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::{info, warn};

use super::{ConnectionHandle, ConnectionRegistry};
use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct HubQuery {
    pub access_token: String,
}

/// `GET /notifhub?access_token=...`
///
/// Browsers cannot set headers on a WebSocket handshake, so the bearer token
/// travels in the query string.
pub async fn notification_hub(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<HubQuery>,
) -> Response {
    let claims = match state.token_issuer.verify_token(&query.access_token) {
        Ok(claims) => claims,
        Err(e) => {
            warn!(error = %e, "Rejected notification hub connection");
            return ApiError::unauthorized("Invalid or expired token", "INVALID_TOKEN")
                .into_response();
        }
    };

    let registry = state.registry.clone();
    ws.on_upgrade(move |socket| serve_connection(socket, registry, claims.email))
}

async fn serve_connection(
    mut socket: WebSocket,
    registry: Arc<dyn ConnectionRegistry>,
    email: String,
) {
    let (handle, mut outbound) = ConnectionHandle::new(&email);
    registry.on_connect(handle.clone());
    info!(email = %handle.email(), connection_id = %handle.id(), "Notification hub connected");

    loop {
        tokio::select! {
            pushed = outbound.recv() => {
                let Some(message) = pushed else { break };
                let text = match serde_json::to_string(&message) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(error = %e, event = %message.event, "Unserializable push dropped");
                        continue;
                    }
                };
                if socket.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    registry.on_disconnect(&handle);
    info!(email = %handle.email(), connection_id = %handle.id(), "Notification hub disconnected");
}
