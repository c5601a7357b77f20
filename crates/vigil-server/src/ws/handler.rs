use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};

use crate::state::AppState;

/// `GET /v1/ws`: upgrades to a WebSocket and joins the dashboard fan-out.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = vigil_common::id::next_id();
    let mut rx = state.hub.connect(&conn_id).await;
    tracing::info!(conn_id = %conn_id, "Dashboard connected");

    let (mut sender, mut receiver) = socket.split();

    // Drains the hub queue into the socket. Exits when the hub drops the
    // sender half or the socket write fails.
    let forward_id = conn_id.clone();
    let mut forward = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let closing = matches!(message, Message::Close(_));
            if sender.send(message).await.is_err() {
                break;
            }
            if closing {
                break;
            }
        }
        forward_id
    });

    // Inbound loop. Dashboards only speak control frames; anything else
    // is ignored.
    loop {
        tokio::select! {
            inbound = receiver.next() => match inbound {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            _ = &mut forward => break,
        }
    }

    state.hub.disconnect(&conn_id).await;
    forward.abort();
    tracing::info!(conn_id = %conn_id, "Dashboard disconnected");
}
