use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::Utf8Bytes;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use genremnant_types::events::{
    ClientCommand, CommentUpdate, Envelope, PostUpdate, ReactionUpdate, ServerEvent, now_millis,
};
use genremnant_types::models::{Comment, Post, Reaction};

/// Per-connection outbound queue.
pub type Outbound = mpsc::UnboundedReceiver<Utf8Bytes>;

struct Client {
    tx: mpsc::UnboundedSender<Utf8Bytes>,
    /// Post this connection narrowed itself to; `None` receives every post.
    subscription: Option<Uuid>,
}

/// Tracks every open socket and fans events out to them.
#[derive(Clone)]
pub struct NotificationHub {
    inner: Arc<RwLock<HashMap<Uuid, Client>>>,
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationHub {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Add a connection. Returns (conn_id, receiver for the socket task).
    pub async fn register(&self) -> (Uuid, Outbound) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        let mut clients = self.inner.write().await;
        clients.insert(
            conn_id,
            Client {
                tx,
                subscription: None,
            },
        );
        info!("WebSocket client {} connected ({} open)", conn_id, clients.len());
        (conn_id, rx)
    }

    pub async fn unregister(&self, conn_id: Uuid) {
        let mut clients = self.inner.write().await;
        if clients.remove(&conn_id).is_some() {
            info!("WebSocket client {} disconnected ({} open)", conn_id, clients.len());
        }
    }

    /// Handle one inbound text frame from `conn_id`.
    pub async fn handle_text(&self, conn_id: Uuid, text: &str) {
        let envelope = match serde_json::from_str::<Envelope>(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(
                    "Client {} sent malformed message: {} -- raw: {}",
                    conn_id,
                    e,
                    text.char_indices().nth(200).map_or(text, |(i, _)| &text[..i])
                );
                return;
            }
        };

        let kind = envelope.kind.clone();
        match ClientCommand::from_envelope(envelope) {
            Ok(Some(ClientCommand::Ping)) => {
                let pong = ServerEvent::Pong {
                    timestamp: now_millis(),
                };
                self.send_to(conn_id, &pong).await;
            }
            Ok(Some(ClientCommand::Subscribe { post_id })) => {
                if let Some(client) = self.inner.write().await.get_mut(&conn_id) {
                    client.subscription = Some(post_id);
                    debug!("Client {} subscribed to post {}", conn_id, post_id);
                }
            }
            Ok(None) => warn!("Client {} sent unknown message type '{}'", conn_id, kind),
            Err(e) => warn!("Client {} sent bad '{}' payload: {}", conn_id, kind, e),
        }
    }

    /// Send to one connection. Returns false if it is gone.
    pub async fn send_to(&self, conn_id: Uuid, event: &ServerEvent) -> bool {
        let Some(text) = encode(event) else {
            return false;
        };
        let clients = self.inner.read().await;
        clients
            .get(&conn_id)
            .is_some_and(|client| client.tx.send(text).is_ok())
    }

    /// Send to every open connection. Returns how many were written.
    pub async fn broadcast(&self, event: &ServerEvent) -> usize {
        let Some(text) = encode(event) else {
            return 0;
        };
        let clients = self.inner.read().await;
        clients
            .values()
            .filter(|client| client.tx.send(text.clone()).is_ok())
            .count()
    }

    /// Send to connections subscribed to `post_id` or to nothing in particular.
    pub async fn broadcast_to_post(&self, post_id: Uuid, event: &ServerEvent) -> usize {
        let Some(text) = encode(event) else {
            return 0;
        };
        let clients = self.inner.read().await;
        clients
            .values()
            .filter(|client| client.subscription.is_none_or(|sub| sub == post_id))
            .filter(|client| client.tx.send(text.clone()).is_ok())
            .count()
    }

    pub async fn notify_reaction_update(&self, post_id: Uuid, reaction: Option<Reaction>) -> usize {
        let event = ServerEvent::ReactionUpdate(ReactionUpdate {
            post_id,
            reaction,
            timestamp: now_millis(),
        });
        self.broadcast_to_post(post_id, &event).await
    }

    pub async fn notify_comment_update(&self, post_id: Uuid, comment: Option<Comment>) -> usize {
        let event = ServerEvent::CommentUpdate(CommentUpdate {
            post_id,
            comment,
            timestamp: now_millis(),
        });
        self.broadcast_to_post(post_id, &event).await
    }

    /// Moderation changes go to everyone, subscribed or not.
    pub async fn notify_post_update(&self, post_id: Uuid, post: Option<Post>) -> usize {
        let event = ServerEvent::PostUpdate(PostUpdate {
            post_id,
            post,
            timestamp: now_millis(),
        });
        self.broadcast(&event).await
    }

    pub async fn client_count(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Drop every sender so all socket tasks wind down.
    pub async fn close_all(&self) {
        let mut clients = self.inner.write().await;
        let n = clients.len();
        clients.clear();
        info!("Closed {} WebSocket connections", n);
    }
}

fn encode(event: &ServerEvent) -> Option<Utf8Bytes> {
    match serde_json::to_string(event) {
        Ok(text) => Some(text.into()),
        Err(e) => {
            warn!("Failed to serialize event: {}", e);
            None
        }
    }
}
