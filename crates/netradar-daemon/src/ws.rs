//! WebSocket handler pushing live scan events to clients

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use netradar_core::Device;
use netradar_discovery::{ScanEvent, ScanResult};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::state::AppState;

/// Wire messages pushed to WebSocket clients
#[derive(Serialize)]
#[serde(tag = "type", content = "data")]
enum WsMessage {
    #[serde(rename = "connected")]
    Connected { message: String },
    #[serde(rename = "devices_list")]
    DevicesList { devices: Vec<Device> },
    #[serde(rename = "scan_started")]
    ScanStarted,
    #[serde(rename = "device_found")]
    DeviceFound(Device),
    #[serde(rename = "device_updated")]
    DeviceUpdated(Device),
    #[serde(rename = "scan_completed")]
    ScanCompleted(ScanResult),
    #[serde(rename = "scan_error")]
    ScanError { error: String },
    #[serde(rename = "pong")]
    Pong,
}

impl From<ScanEvent> for WsMessage {
    fn from(event: ScanEvent) -> Self {
        match event {
            ScanEvent::ScanStarted => WsMessage::ScanStarted,
            ScanEvent::DeviceFound(device) => WsMessage::DeviceFound(device),
            ScanEvent::DeviceUpdated(device) => WsMessage::DeviceUpdated(device),
            ScanEvent::ScanCompleted(result) => WsMessage::ScanCompleted(result),
            ScanEvent::ScanError { message } => WsMessage::ScanError { error: message },
        }
    }
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
    let mut events = state.subscribe();

    info!("WebSocket client connected");

    let greeting = WsMessage::Connected {
        message: "Connected to netradar".to_string(),
    };
    if send_json(&mut sender, &greeting).await.is_err() {
        return;
    }

    // Known devices snapshot so late joiners see current state
    let devices = state.devices().await;
    if !devices.is_empty() {
        let snapshot = WsMessage::DevicesList { devices };
        if send_json(&mut sender, &snapshot).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            // Forward scan events to this client
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        let msg = WsMessage::from(event);
                        if send_json(&mut sender, &msg).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        debug!(skipped = n, "Event channel lagged");
                    }
                    Err(e) => {
                        debug!(error = %e, "Event channel closed");
                        break;
                    }
                }
            }

            // Handle inbound client commands
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => match text.as_str() {
                        "ping" => {
                            if send_json(&mut sender, &WsMessage::Pong).await.is_err() {
                                break;
                            }
                        }
                        "scan" => {
                            // Conflict just means a scan is already running
                            let _ = state.scanner.start_scan();
                        }
                        _ => {}
                    },
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
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

async fn send_json(
    sender: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    msg: &WsMessage,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(msg).map_err(axum::Error::new)?;
    sender.send(Message::Text(json.into())).await
}
