use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Comment, Post, Reaction};

/// Wire envelope used in both directions on `/ws`: `{ "type": ..., "payload": ... }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub payload: serde_json::Value,
}

/// Events sent from the server to connected sockets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Welcome message sent once per connection
    Connected { message: String },

    /// Reply to a client `ping`; epoch milliseconds
    Pong { timestamp: i64 },

    /// A reaction was added, replaced or removed on a post
    ReactionUpdate(ReactionUpdate),

    /// A comment was added, edited or removed on a post
    CommentUpdate(CommentUpdate),

    /// A post was published, rejected or deleted by moderation
    PostUpdate(PostUpdate),
}

impl ServerEvent {
    /// Post this event concerns, if any.
    pub fn post_id(&self) -> Option<Uuid> {
        match self {
            Self::ReactionUpdate(u) => Some(u.post_id),
            Self::CommentUpdate(u) => Some(u.post_id),
            Self::PostUpdate(u) => Some(u.post_id),
            Self::Connected { .. } | Self::Pong { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionUpdate {
    pub post_id: Uuid,
    /// `None` when the reaction was removed
    pub reaction: Option<Reaction>,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentUpdate {
    pub post_id: Uuid,
    /// `None` when the comment was deleted
    pub comment: Option<Comment>,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostUpdate {
    pub post_id: Uuid,
    /// `None` when the post was deleted
    pub post: Option<Post>,
    pub timestamp: i64,
}

/// Commands sent FROM client TO server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    Ping,
    /// Replace this connection's subscription with a single post
    Subscribe { post_id: Uuid },
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubscribePayload {
    post_id: Uuid,
}

impl ClientCommand {
    /// Decode an inbound envelope. Returns `Ok(None)` for unrecognised types.
    pub fn from_envelope(envelope: Envelope) -> Result<Option<Self>, serde_json::Error> {
        match envelope.kind.as_str() {
            "ping" => Ok(Some(Self::Ping)),
            "subscribe" => {
                let payload: SubscribePayload = serde_json::from_value(envelope.payload)?;
                Ok(Some(Self::Subscribe {
                    post_id: payload.post_id,
                }))
            }
            _ => Ok(None),
        }
    }

    pub fn to_envelope(&self) -> Envelope {
        match self {
            Self::Ping => Envelope {
                kind: "ping".into(),
                payload: serde_json::Value::Null,
            },
            Self::Subscribe { post_id } => Envelope {
                kind: "subscribe".into(),
                payload: serde_json::json!({ "postId": post_id }),
            },
        }
    }
}

/// Milliseconds since the Unix epoch, as carried in event payloads.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
