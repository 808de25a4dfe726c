//! The single bidirectional `/ws` upgrade: subscribes the
//! connection to the public price/depth/trade stream and, for an
//! authenticated connection, to that user's private events.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;

use crate::app::AppState;
use crate::auth::verify_credential;

/// An optional bearer token passed as a query parameter, since browser
/// WebSocket clients cannot set an `Authorization` header on the upgrade
/// request.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

pub async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>, Query(query): Query<WsQuery>) -> Response {
    let user_id = query
        .token
        .as_deref()
        .and_then(|token| verify_credential(&state.jwt_secret, token).ok())
        .map(|claims| claims.user_id);

    ws.on_upgrade(move |socket| handle_socket(socket, state, user_id))
}

async fn handle_socket(socket: WebSocket, state: AppState, user_id: Option<uuid::Uuid>) {
    let Ok((client_id, mut outbound)) = state.hub.register(user_id).await else {
        return;
    };

    let (mut writer, mut reader) = socket.split();
    let write_deadline = state.ws_write_deadline;

    let mut write_task = tokio::spawn(async move {
        while let Some(payload) = outbound.recv().await {
            let send = tokio::time::timeout(write_deadline, writer.send(Message::Text(payload.to_string()))).await;
            match send {
                Ok(Ok(())) => {}
                Ok(Err(_)) => break,
                Err(_) => {
                    log::warn!("ws writer: send exceeded {write_deadline:?} deadline, dropping connection");
                    break;
                }
            }
        }
    });

    // Drain and discard client frames; this stream is server-push only.
    // A `Close` frame or read error ends the connection.
    let read_loop = async {
        while let Some(message) = reader.next().await {
            if matches!(message, Err(_) | Ok(Message::Close(_))) {
                break;
            }
        }
    };

    tokio::select! {
        () = read_loop => {}
        _ = &mut write_task => {}
    }

    write_task.abort();
    state.hub.unregister(client_id).await;
}
