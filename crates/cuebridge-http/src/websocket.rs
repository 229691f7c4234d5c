//! WebSocket change channel.
//!
//! Each connection is one observer of the state synchronizer. Every push
//! tick the connection asks for the changes since its last tick and sends
//! them as `change` messages; client requests are answered in between.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use cuebridge_core::schema::ComponentSchema;
use cuebridge_core::{Error, ObserverId, ParamValue, ParameterChange};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::AppState;

/// Messages accepted from clients.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Replace the subscribed component paths.
    Subscribe { paths: Vec<String> },
    Unsubscribe,
    Set {
        path: String,
        parameter: String,
        value: ParamValue,
    },
    GetSchema { path: String },
    Ping,
}

/// Messages sent to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Connected {
        observer: ObserverId,
        push_interval_ms: u64,
    },
    Subscribed { paths: Vec<String> },
    Change(ParameterChange),
    SetResult {
        path: String,
        parameter: String,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Schema(ComponentSchema),
    Pong,
    Error { message: String },
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle a WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let sync = state.bridge.sync.clone();
    let observer = sync.register();
    log::info!("WebSocket observer {} connected", observer);

    // Replies from the receive loop go through the send task
    let (out_tx, mut out_rx) = mpsc::channel::<ServerMessage>(64);

    let greeting = ServerMessage::Connected {
        observer,
        push_interval_ms: state.push_interval.as_millis() as u64,
    };
    let _ = out_tx.send(greeting).await;

    let push_sync = sync.clone();
    let push_interval = state.push_interval;
    let send_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(push_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            let outgoing = tokio::select! {
                _ = interval.tick() => match push_sync.push_changes_since(observer).await {
                    Ok(changes) => changes.into_iter().map(ServerMessage::Change).collect(),
                    Err(Error::NotFound(_)) => break,
                    Err(e) => {
                        log::debug!("Push tick for observer {} failed: {}", observer, e);
                        Vec::new()
                    }
                },
                reply = out_rx.recv() => match reply {
                    Some(reply) => vec![reply],
                    None => break,
                },
            };
            for msg in outgoing {
                let text = serde_json::to_string(&msg).unwrap_or_default();
                if sender.send(Message::Text(text.into())).await.is_err() {
                    return;
                }
            }
        }
    });

    // Handle incoming messages from client
    while let Some(msg) = receiver.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => continue,
        };
        let reply = match serde_json::from_str::<ClientMessage>(&text) {
            Ok(request) => handle_message(&state, observer, request).await,
            Err(e) => ServerMessage::Error {
                message: format!("Invalid message: {}", e),
            },
        };
        if out_tx.send(reply).await.is_err() {
            break;
        }
    }

    send_task.abort();
    sync.unregister(observer);
    log::info!("WebSocket observer {} disconnected", observer);
}

/// Answer one client request.
async fn handle_message(state: &AppState, observer: ObserverId, msg: ClientMessage) -> ServerMessage {
    let sync = &state.bridge.sync;
    match msg {
        ClientMessage::Subscribe { paths } => ServerMessage::Subscribed {
            paths: sync.subscribe(observer, &paths).await,
        },
        ClientMessage::Unsubscribe => {
            sync.unsubscribe(observer).await;
            ServerMessage::Subscribed { paths: Vec::new() }
        }
        ClientMessage::Set {
            path,
            parameter,
            value,
        } => {
            let change = ParameterChange {
                path,
                parameter,
                value,
            };
            let result = sync.set_as(observer, &change).await;
            ServerMessage::SetResult {
                path: change.path,
                parameter: change.parameter,
                success: result.is_ok(),
                error: result.err().map(|e| e.to_string()),
            }
        }
        ClientMessage::GetSchema { path } => match sync.poll(&path).await {
            Ok(schema) => ServerMessage::Schema(schema),
            Err(e) => ServerMessage::Error {
                message: e.to_string(),
            },
        },
        ClientMessage::Ping => ServerMessage::Pong,
    }
}
