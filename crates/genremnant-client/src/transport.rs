use std::future::{self, Future};

use chrono::{DateTime, SecondsFormat, Utc};
use futures_util::stream::BoxStream;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};
use uuid::Uuid;

use genremnant_types::events::{ClientCommand, ReactionUpdate, ServerEvent};

use crate::error::{ClientError, Result};

/// One live connection: decoded server events plus a command queue back to the server.
pub struct Session {
    /// Ends when the connection closes.
    pub events: BoxStream<'static, ServerEvent>,
    pub commands: mpsc::UnboundedSender<ClientCommand>,
}

/// Position in the server's reaction feed: `updatedAt` and id of the last reaction seen.
///
/// Both come from server rows, so the client clock never decides what is skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollCursor {
    pub since: DateTime<Utc>,
    pub after: Option<Uuid>,
}

impl PollCursor {
    pub fn at(since: DateTime<Utc>) -> Self {
        Self { since, after: None }
    }

    /// Move past the update's reaction if it is newer than the cursor.
    /// Returns whether the cursor moved.
    pub fn advance(&mut self, update: &ReactionUpdate) -> bool {
        let Some(reaction) = &update.reaction else {
            return false;
        };
        let seen = (reaction.updated_at, Some(reaction.id));
        if seen <= (self.since, self.after) {
            return false;
        }
        self.since = reaction.updated_at;
        self.after = Some(reaction.id);
        true
    }
}

/// How the receiver reaches the server.
pub trait Transport: Send + Sync + 'static {
    fn connect(&self) -> impl Future<Output = Result<Session>> + Send;

    /// One page of reaction updates written after `cursor`, oldest first.
    fn poll(&self, cursor: PollCursor) -> impl Future<Output = Result<Vec<ReactionUpdate>>> + Send;
}

/// Socket over `tokio-tungstenite`, polling over `reqwest`.
#[derive(Debug, Clone)]
pub struct WsTransport {
    http: reqwest::Client,
    api_base: String,
    ws_url: String,
}

impl WsTransport {
    /// `server` is the HTTP base URL, e.g. `https://genr.example`.
    pub fn new(server: &str) -> Result<Self> {
        let api_base = server.trim_end_matches('/').to_string();
        let ws_url = ws_url(&api_base)?;
        Ok(Self {
            http: reqwest::Client::new(),
            api_base,
            ws_url,
        })
    }

    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }
}

fn ws_url(api_base: &str) -> Result<String> {
    let rest = if let Some(rest) = api_base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = api_base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        return Err(ClientError::InvalidUrl(api_base.to_string()));
    };
    Ok(format!("{}/ws", rest))
}

fn decode_event(text: &str) -> Option<ServerEvent> {
    match serde_json::from_str(text) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!("Ignoring undecodable server message: {}", e);
            None
        }
    }
}

impl Transport for WsTransport {
    async fn connect(&self) -> Result<Session> {
        let (stream, _) = tokio_tungstenite::connect_async(self.ws_url.as_str()).await?;
        let (mut sink, stream) = stream.split();

        let (commands, mut outbound) = mpsc::unbounded_channel::<ClientCommand>();
        tokio::spawn(async move {
            while let Some(command) = outbound.recv().await {
                let text = match serde_json::to_string(&command.to_envelope()) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("Failed to serialize command: {}", e);
                        continue;
                    }
                };
                if sink.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let events = stream
            .take_while(|frame| future::ready(matches!(frame, Ok(msg) if !msg.is_close())))
            .filter_map(|frame| {
                future::ready(match frame {
                    Ok(Message::Text(text)) => decode_event(text.as_str()),
                    Ok(other) => {
                        debug!("Skipping non-text frame ({} bytes)", other.len());
                        None
                    }
                    Err(_) => None,
                })
            })
            .boxed();

        Ok(Session { events, commands })
    }

    async fn poll(&self, cursor: PollCursor) -> Result<Vec<ReactionUpdate>> {
        let mut req = self
            .http
            .get(format!("{}/api/reactions/updates", self.api_base))
            .query(&[("since", cursor.since.to_rfc3339_opts(SecondsFormat::Micros, true))]);
        if let Some(after) = cursor.after {
            req = req.query(&[("after", after.to_string())]);
        }
        let updates = req.send().await?.error_for_status()?.json().await?;
        Ok(updates)
    }
}
