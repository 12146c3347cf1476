//! WebSocket side channel for upload progress.
//!
//! A client connects to `/socket?socketId=<id>` (or lets the server pick an
//! id), then passes the same id to `POST /?socketId=<id>`. Every
//! `file-processed` event of that upload arrives as a JSON text frame.

use crate::{models::progress::ProgressEvent, services::notifier::SocketHub, state::AppState};
use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct SocketQuery {
    #[serde(rename = "socketId")]
    pub socket_id: Option<String>,
}

/// `GET /socket`: upgrade and subscribe.
pub async fn socket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<SocketQuery>,
) -> impl IntoResponse {
    let socket_id = query
        .socket_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    ws.on_upgrade(move |socket| handle_socket(socket, state.hub, socket_id))
}

async fn handle_socket(mut socket: WebSocket, hub: Arc<SocketHub>, socket_id: String) {
    let shutdown = hub.shutdown_token();
    let mut subscription = hub.subscribe(&socket_id);
    info!(%socket_id, "socket connected");

    let hello = ProgressEvent::Connected {
        socket_id: socket_id.clone(),
    };
    if send_event(&mut socket, &hello).await {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                }
                event = subscription.events.recv() => {
                    let Some(event) = event else { break };
                    if !send_event(&mut socket, &event).await {
                        break;
                    }
                }
                incoming = socket.recv() => match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        debug!(%socket_id, "socket read failed: {}", err);
                        break;
                    }
                },
            }
        }
    }

    hub.unsubscribe(&socket_id, subscription.subscriber_id);
    info!(%socket_id, "socket closed");
}

/// Returns false once the socket can no longer be written to.
async fn send_event(socket: &mut WebSocket, event: &ProgressEvent) -> bool {
    let json = match serde_json::to_string(event) {
        Ok(json) => json,
        Err(err) => {
            warn!("could not encode {} event: {}", event.name(), err);
            return true;
        }
    };
    socket.send(Message::Text(json.into())).await.is_ok()
}
