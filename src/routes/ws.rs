use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;

use crate::error::AppResult;
use crate::routes::auth::user_from_token;
use crate::services::push::PushHub;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: String,
}

/// Authenticate from `?token=` (browsers cannot set headers on the upgrade
/// request), then hand the socket over to the push hub.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<WsQuery>,
) -> AppResult<impl IntoResponse> {
    let user = user_from_token(&state, query.token.trim()).await?;
    let push = state.push.clone();
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, push, user.id)))
}

async fn handle_socket(socket: WebSocket, push: Arc<PushHub>, user_id: String) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, user_id = %user_id, "Push socket connected");

    let mut rx = push.register(conn_id.clone(), user_id.clone()).await;
    let (mut sink, mut stream) = socket.split();

    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if sink.send(msg).await.is_err() || closing {
                tracing::debug!(conn_id = %sender_conn_id, "Push socket sink closed");
                break;
            }
        }
    });

    // Inbound frames carry nothing; drain until the client goes away.
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "Push socket receive error");
                break;
            }
        }
    }

    push.unregister(&conn_id).await;
    send_task.abort();
    tracing::info!(conn_id = %conn_id, user_id = %user_id, "Push socket disconnected");
}
