use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use futures_util::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

use genremnant_types::api::UPDATES_PAGE_LIMIT;
use genremnant_types::events::{ClientCommand, ServerEvent};

use crate::error::{ClientError, Result};
use crate::registry::{Callback, Registry, Topic};
use crate::transport::{PollCursor, Session, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    /// Terminal: the socket is given up and updates are fetched on a timer.
    Polling,
}

#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// Base delay; attempt `n` waits `n × reconnect_delay`.
    pub reconnect_delay: Duration,
    pub max_reconnect_attempts: u32,
    pub poll_interval: Duration,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(1),
            max_reconnect_attempts: 5,
            poll_interval: Duration::from_secs(5),
        }
    }
}

pub struct UpdateReceiver<T> {
    transport: Arc<T>,
    config: ReceiverConfig,
    registry: Registry,
    state: watch::Sender<ConnectionState>,
    commands: Arc<Mutex<Option<mpsc::UnboundedSender<ClientCommand>>>>,
}

impl<T> Clone for UpdateReceiver<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            config: self.config.clone(),
            registry: self.registry.clone(),
            state: self.state.clone(),
            commands: self.commands.clone(),
        }
    }
}

impl<T: Transport> UpdateReceiver<T> {
    pub fn new(transport: T, config: ReceiverConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            transport: Arc::new(transport),
            config,
            registry: Registry::new(),
            state,
            commands: Arc::new(Mutex::new(None)),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn subscribe(&self, topic: Topic, post_id: Uuid, callback: Callback) {
        self.registry.subscribe(topic, post_id, callback);
    }

    pub fn unsubscribe(&self, topic: Topic, post_id: Uuid, callback: &Callback) -> bool {
        self.registry.unsubscribe(topic, post_id, callback)
    }

    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Queue a command on the live socket.
    pub fn send(&self, command: ClientCommand) -> Result<()> {
        let commands = self.commands.lock().unwrap_or_else(PoisonError::into_inner);
        match commands.as_ref() {
            Some(tx) => tx.send(command).map_err(|_| ClientError::NotConnected),
            None => Err(ClientError::NotConnected),
        }
    }

    pub fn spawn(&self) -> JoinHandle<()> {
        let receiver = self.clone();
        tokio::spawn(async move { receiver.run().await })
    }

    /// Connect, reconnect with linear backoff, then poll forever once the
    /// attempts run out. Never returns.
    pub async fn run(&self) {
        let mut attempt: u32 = 0;
        // Moved forward by every pushed or polled reaction
        let mut cursor = PollCursor::at(Utc::now());

        loop {
            if attempt == 0 {
                self.set_state(ConnectionState::Connecting);
            }

            match self.transport.connect().await {
                Ok(session) => {
                    attempt = 0;
                    self.set_state(ConnectionState::Connected);
                    info!("Update socket connected");
                    self.pump(session, &mut cursor).await;
                    info!("Update socket closed");
                }
                Err(e) => warn!("Update socket connect failed: {}", e),
            }

            if attempt >= self.config.max_reconnect_attempts {
                break;
            }
            attempt += 1;
            self.set_state(ConnectionState::Reconnecting { attempt });
            let delay = self.config.reconnect_delay * attempt;
            debug!("Reconnecting in {:?} (attempt {})", delay, attempt);
            tokio::time::sleep(delay).await;
        }

        warn!(
            "Giving up on the update socket after {} attempts, polling every {:?}",
            self.config.max_reconnect_attempts, self.config.poll_interval
        );
        self.poll_forever(cursor).await;
    }

    async fn pump(&self, session: Session, cursor: &mut PollCursor) {
        let Session { mut events, commands } = session;
        self.set_commands(Some(commands));
        while let Some(event) = events.next().await {
            if let ServerEvent::ReactionUpdate(update) = &event {
                cursor.advance(update);
            }
            self.registry.dispatch(&event);
        }
        self.set_commands(None);
    }

    async fn poll_forever(&self, mut cursor: PollCursor) {
        self.set_state(ConnectionState::Polling);
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.drain(&mut cursor).await;
        }
    }

    /// Fetch pages until the server returns a short one.
    async fn drain(&self, cursor: &mut PollCursor) {
        loop {
            let updates = match self.transport.poll(*cursor).await {
                Ok(updates) => updates,
                Err(e) => {
                    warn!("Polling for updates failed: {}", e);
                    return;
                }
            };
            let full = updates.len() >= UPDATES_PAGE_LIMIT;
            let mut moved = false;
            for update in updates {
                moved |= cursor.advance(&update);
                self.registry.dispatch(&ServerEvent::ReactionUpdate(update));
            }
            if !full || !moved {
                return;
            }
            debug!("Full page of updates, fetching the next one");
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }

    fn set_commands(&self, commands: Option<mpsc::UnboundedSender<ClientCommand>>) {
        *self.commands.lock().unwrap_or_else(PoisonError::into_inner) = commands;
    }
}
