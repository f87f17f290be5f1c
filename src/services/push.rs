//! Live delivery of stored notifications over WebSocket connections.

use std::collections::HashMap;

use async_trait::async_trait;
use axum::extract::ws::Message;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, RwLock};

use crate::db::Notification;

/// Something that can hand a notification to a user's live sessions.
#[async_trait]
pub trait PushChannel: Send + Sync + 'static {
    /// Returns the number of connections the notification was handed to.
    async fn push(&self, user_id: &str, notification: &Notification) -> usize;
}

/// Sender half feeding one WebSocket connection.
pub type PushSender = mpsc::UnboundedSender<Message>;

struct PushConnection {
    user_id: String,
    sender: PushSender,
    connected_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct PushFrame<'a> {
    event: &'static str,
    notification: &'a Notification,
}

/// Encode the text frame sent for a notification.
pub fn notification_frame(notification: &Notification) -> serde_json::Result<String> {
    serde_json::to_string(&PushFrame {
        event: "notification",
        notification,
    })
}

/// Registry of open WebSocket connections keyed by connection id.
pub struct PushHub {
    connections: RwLock<HashMap<String, PushConnection>>,
}

impl PushHub {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a connection and return the receiver the socket writer drains.
    pub async fn register(
        &self,
        conn_id: String,
        user_id: String,
    ) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = PushConnection {
            user_id,
            sender: tx,
            connected_at: Utc::now(),
        };
        self.connections.write().await.insert(conn_id, conn);
        rx
    }

    pub async fn unregister(&self, conn_id: &str) {
        if let Some(conn) = self.connections.write().await.remove(conn_id) {
            let open_for = Utc::now() - conn.connected_at;
            tracing::debug!(
                conn_id,
                user_id = %conn.user_id,
                open_secs = open_for.num_seconds(),
                "Push connection removed"
            );
        }
    }

    /// Send a message to every connection of `user_id`; closed channels are skipped.
    pub async fn send_to_user(&self, user_id: &str, message: Message) -> usize {
        let conns = self.connections.read().await;
        let mut count = 0;
        for conn in conns.values() {
            if conn.user_id == user_id && conn.sender.send(message.clone()).is_ok() {
                count += 1;
            }
        }
        count
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Send a Close frame to every connection, then clear the registry.
    pub async fn shutdown_all(&self) {
        let mut conns = self.connections.write().await;
        let count = conns.len();
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Close(None));
        }
        conns.clear();
        tracing::info!(count, "Closed all push connections");
    }
}

impl Default for PushHub {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PushChannel for PushHub {
    async fn push(&self, user_id: &str, notification: &Notification) -> usize {
        match notification_frame(notification) {
            Ok(text) => self.send_to_user(user_id, Message::Text(text)).await,
            Err(e) => {
                tracing::error!(
                    notification_id = %notification.id,
                    error = %e,
                    "Failed to encode push frame"
                );
                0
            }
        }
    }
}
