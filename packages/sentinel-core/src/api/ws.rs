//! WebSocket handler for the live intelligence feed.
//!
//! Each socket is registered with the [`ConnectionHub`](crate::api::ConnectionHub)
//! for detection broadcasts and attached to the live feed for its synthetic
//! timers. The feed is push-only; inbound text frames are ignored.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::sink::SinkExt;
use futures::stream::StreamExt;

use crate::api::ws_connection::WsLiveConnection;
use crate::api::AppState;
use crate::events::LiveConnection;

/// Upgrades the request to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

/// Main WebSocket connection handler.
async fn handle_ws(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    let (connection, mut outbound) = WsLiveConnection::new(state.hub.next_connection_id());
    let conn_guard = state.hub.register(connection.clone() as Arc<dyn LiveConnection>);
    let cancel_token = conn_guard.cancel_token().clone();

    log::info!("[WS] New connection established: {}", conn_guard.id());

    // Queues the welcome message before the timers start.
    let subscription = state
        .live_feed
        .attach(connection.clone() as Arc<dyn LiveConnection>);

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                log::info!("[WS] Connection force-closed: {}", conn_guard.id());
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
            frame = outbound.recv() => {
                let Some(text) = frame else { break };
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(Message::Text(text))) => {
                        log::debug!("[WS] Ignoring inbound frame on {}: {}", conn_guard.id(), text.as_str());
                    }
                    _ => {}
                }
            }
        }
    }

    connection.mark_closed();
    subscription.cancel_all();
    log::info!("[WS] Client disconnected: {}", conn_guard.id());
    // ConnectionGuard::drop unregisters from the hub.
}
