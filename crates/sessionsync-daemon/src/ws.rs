//! WebSocket handler for real-time updates

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use sessionsync_core::DeviceRecord;
use sessionsync_discovery::DiscoveryEvent;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::state::AppState;

/// Outgoing WebSocket messages
#[derive(Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
enum WsMessage {
    DiscoveredConsoles(Vec<DeviceRecord>),
    ConsoleDiscovered(DeviceRecord),
    ConsoleUpdated(DeviceRecord),
    ConsoleRemoved(DeviceRecord),
    DiscoveryStarted,
    DiscoveryStopped,
    Pong,
}

impl From<DiscoveryEvent> for WsMessage {
    fn from(event: DiscoveryEvent) -> Self {
        match event {
            DiscoveryEvent::DeviceDiscovered(record) => Self::ConsoleDiscovered(record),
            DiscoveryEvent::DeviceUpdated(record) => Self::ConsoleUpdated(record),
            DiscoveryEvent::DeviceRemoved(record) => Self::ConsoleRemoved(record),
        }
    }
}

/// Incoming control messages
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    StartDiscovery,
    StopDiscovery,
}

/// WebSocket upgrade handler
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    // Subscribe before the snapshot so nothing falls between them
    let mut events = state.session.subscribe();

    info!("WebSocket client connected");

    let snapshot = WsMessage::DiscoveredConsoles(state.session.snapshot().await);
    if send(&mut sender, &snapshot).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        if send(&mut sender, &WsMessage::from(event)).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        debug!(skipped = n, "WebSocket client lagging, events dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = handle_text(&state, text.as_str()).await {
                            if send(&mut sender, &reply).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    info!("WebSocket client disconnected");
}

async fn handle_text(state: &AppState, text: &str) -> Option<WsMessage> {
    if text == "ping" {
        return Some(WsMessage::Pong);
    }
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::StartDiscovery) => {
            state.session.start().await;
            Some(WsMessage::DiscoveryStarted)
        }
        Ok(ClientMessage::StopDiscovery) => {
            state.session.stop().await;
            Some(WsMessage::DiscoveryStopped)
        }
        Err(e) => {
            debug!(error = %e, "Ignoring unknown WebSocket message");
            None
        }
    }
}

async fn send<S>(sender: &mut S, msg: &WsMessage) -> Result<(), ()>
where
    S: SinkExt<Message> + Unpin,
{
    let json = serde_json::to_string(msg).map_err(|_| ())?;
    sender.send(Message::Text(json.into())).await.map_err(|_| ())
}
