use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, warn};

use genremnant_types::events::ServerEvent;

use crate::hub::NotificationHub;

/// Heartbeat interval: server sends a Ping every 30 seconds.
/// If 2 consecutive Pongs are missed the connection is dropped.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

pub const WELCOME_MESSAGE: &str = "Connected to GenR App";

/// Drive one upgraded socket until either side goes away.
pub async fn handle_socket(socket: WebSocket, hub: NotificationHub) {
    let (mut sender, mut receiver) = socket.split();
    let (conn_id, mut outbound) = hub.register().await;

    let welcome = ServerEvent::Connected {
        message: WELCOME_MESSAGE.to_string(),
    };
    match serde_json::to_string(&welcome) {
        Ok(text) => {
            if sender.send(Message::Text(text.into())).await.is_err() {
                hub.unregister(conn_id).await;
                return;
            }
        }
        Err(e) => warn!("Failed to serialize welcome: {}", e),
    }

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Hub queue -> socket, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                msg = outbound.recv() => {
                    let Some(text) = msg else { break };
                    if sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Client {} missed {} pongs, dropping connection", conn_id, missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(Default::default())).await.is_err() {
                        break;
                    }
                }
            }
        }
        let _ = sender.close().await;
    });

    // Socket -> hub
    let hub_recv = hub.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => hub_recv.handle_text(conn_id, text.as_str()).await,
                Message::Pong(_) => pong_flag_recv.store(true, Ordering::Release),
                Message::Close(_) => break,
                Message::Binary(_) => debug!("Client {} sent a binary frame, ignoring", conn_id),
                Message::Ping(_) => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    hub.unregister(conn_id).await;
}
