//! One persistent connection: pumps the hub's outbound queue to the socket
//! and feeds incoming text frames to the hub.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::IntoResponse;

use super::AppState;
use crate::hub::Hub;

/// Upgrade an HTTP request to a WebSocket connection.
pub async fn upgrade(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(app): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, addr, app.hub))
}

async fn handle_socket(mut socket: WebSocket, addr: SocketAddr, hub: Arc<Hub>) {
    let (id, mut outbound) = hub.connect(Some(addr));

    loop {
        tokio::select! {
            msg = outbound.recv() => {
                let Some(msg) = msg else {
                    break;
                };
                let text = match msg.encode() {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!("Failed to encode {} for connection {}: {}", msg.kind(), id, e);
                        continue;
                    }
                };
                if socket.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }

            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => hub.handle_text(id, &text),
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!("Connection {} read error: {}", id, e);
                        break;
                    }
                    _ => {} // pings and binary frames
                }
            }
        }
    }

    hub.disconnect(id);
}
