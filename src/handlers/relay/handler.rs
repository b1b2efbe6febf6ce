//! Relay WebSocket handler
//!
//! Upgrades client connections and bridges them onto the shared relay
//! session: binary frames in are appended as input audio, broadcast
//! deliveries out are forwarded as binary frames and control events.

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::core::relay::Delivery;
use crate::state::AppState;

use super::messages::{
    MAX_AUDIO_FRAME_SIZE, MAX_CONTROL_SIZE, RelayIncomingMessage, RelayMessageRoute,
    RelayOutgoingMessage,
};

/// Channel buffer size for audio workloads
const CHANNEL_BUFFER_SIZE: usize = 1024;

/// Maximum WebSocket frame size (2 MB)
const MAX_WS_FRAME_SIZE: usize = 2 * 1024 * 1024;

/// Maximum WebSocket message size (2 MB)
const MAX_WS_MESSAGE_SIZE: usize = 2 * 1024 * 1024;

/// Relay WebSocket handler
///
/// Upgrades the HTTP connection to WebSocket. Each connection joins the
/// shared upstream session; the first connection to start streaming
/// triggers the upstream connect and the last one to leave tears it down.
pub async fn relay_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    info!("Relay WebSocket connection upgrade requested");

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_relay_socket(socket, state))
}

/// Handle the relay WebSocket connection
async fn handle_relay_socket(socket: WebSocket, app_state: Arc<AppState>) {
    let connection_id = Uuid::new_v4();
    info!(connection_id = %connection_id, "Relay WebSocket connection established");

    let (mut sender, mut receiver) = socket.split();
    let (message_tx, mut message_rx) = mpsc::channel::<RelayMessageRoute>(CHANNEL_BUFFER_SIZE);

    // Sender task for outgoing messages
    let sender_task = tokio::spawn(async move {
        while let Some(route) = message_rx.recv().await {
            let result = match route {
                RelayMessageRoute::Outgoing(message) => match serde_json::to_string(&message) {
                    Ok(json_str) => sender.send(Message::Text(json_str.into())).await,
                    Err(e) => {
                        error!("Failed to serialize outgoing message: {}", e);
                        continue;
                    }
                },
                RelayMessageRoute::Audio(data) => sender.send(Message::Binary(data)).await,
            };

            if let Err(e) = result {
                error!("Failed to send WebSocket message: {}", e);
                break;
            }
        }
    });

    // Delivery channel registered with the session; a forwarder task turns
    // broadcast deliveries into client-facing WebSocket routes.
    let (delivery_tx, mut delivery_rx) = mpsc::channel::<Delivery>(CHANNEL_BUFFER_SIZE);
    let forward_tx = message_tx.clone();
    let forward_task = tokio::spawn(async move {
        while let Some(delivery) = delivery_rx.recv().await {
            let route = match delivery {
                Delivery::Audio(audio) => RelayMessageRoute::Audio(audio),
                Delivery::ResponseDone(response_id) => {
                    RelayMessageRoute::Outgoing(RelayOutgoingMessage::ResponseDone { response_id })
                }
                Delivery::Error { code, message } => {
                    RelayMessageRoute::Outgoing(RelayOutgoingMessage::Error {
                        code: Some(code),
                        message,
                    })
                }
            };
            if forward_tx.send(route).await.is_err() {
                break;
            }
        }
    });

    // Whether this connection has joined the session
    let mut streaming = false;

    loop {
        match receiver.next().await {
            Some(Ok(msg)) => {
                let continue_processing = process_relay_message(
                    msg,
                    connection_id,
                    &mut streaming,
                    &delivery_tx,
                    &message_tx,
                    &app_state,
                )
                .await;

                if !continue_processing {
                    break;
                }
            }
            Some(Err(e)) => {
                warn!("Relay WebSocket error: {}", e);
                let _ = message_tx
                    .send(RelayMessageRoute::Outgoing(RelayOutgoingMessage::Error {
                        code: Some("websocket_error".to_string()),
                        message: format!("WebSocket error: {e}"),
                    }))
                    .await;
                break;
            }
            None => {
                info!(connection_id = %connection_id, "Relay WebSocket closed by client");
                break;
            }
        }
    }

    // Cleanup: leaving the session may tear down the upstream connection
    // when this was the last attached client.
    if streaming {
        app_state.session.detach(connection_id).await;
    }
    forward_task.abort();
    sender_task.abort();

    info!(connection_id = %connection_id, "Relay WebSocket connection terminated");
}

/// Process incoming WebSocket message
async fn process_relay_message(
    msg: Message,
    connection_id: Uuid,
    streaming: &mut bool,
    delivery_tx: &mpsc::Sender<Delivery>,
    message_tx: &mpsc::Sender<RelayMessageRoute>,
    app_state: &Arc<AppState>,
) -> bool {
    match msg {
        Message::Text(text) => {
            debug!("Received control message: {} bytes", text.len());

            if text.len() > MAX_CONTROL_SIZE {
                warn!("Control message too large: {} bytes", text.len());
                send_error(
                    message_tx,
                    "validation_error",
                    format!(
                        "Control message too large: {} bytes (max: {} bytes)",
                        text.len(),
                        MAX_CONTROL_SIZE
                    ),
                )
                .await;
                return true;
            }

            let incoming_msg: RelayIncomingMessage = match serde_json::from_str(&text) {
                Ok(msg) => msg,
                Err(e) => {
                    error!("Failed to parse relay message: {}", e);
                    send_error(
                        message_tx,
                        "parse_error",
                        format!("Invalid message format: {e}"),
                    )
                    .await;
                    return true;
                }
            };

            handle_relay_incoming(
                incoming_msg,
                connection_id,
                streaming,
                delivery_tx,
                message_tx,
                app_state,
            )
            .await
        }
        Message::Binary(data) => {
            debug!("Received binary audio: {} bytes", data.len());

            if data.len() > MAX_AUDIO_FRAME_SIZE {
                send_error(
                    message_tx,
                    "validation_error",
                    format!(
                        "Audio frame too large: {} bytes (max: {} bytes)",
                        data.len(),
                        MAX_AUDIO_FRAME_SIZE
                    ),
                )
                .await;
                return true;
            }

            if !*streaming {
                send_error(
                    message_tx,
                    "not_streaming",
                    "Send start_stream before audio".to_string(),
                )
                .await;
                return true;
            }

            if let Err(e) = app_state.session.append_audio(&data).await {
                warn!(connection_id = %connection_id, error = %e, "Failed to append audio");
                send_error(message_tx, e.code(), e.to_string()).await;
            }
            true
        }
        Message::Close(_) => {
            info!(connection_id = %connection_id, "Received close message from client");
            false
        }
        // Axum answers pings automatically
        Message::Ping(_) | Message::Pong(_) => true,
    }
}

/// Handle a parsed incoming control message
async fn handle_relay_incoming(
    msg: RelayIncomingMessage,
    connection_id: Uuid,
    streaming: &mut bool,
    delivery_tx: &mpsc::Sender<Delivery>,
    message_tx: &mpsc::Sender<RelayMessageRoute>,
    app_state: &Arc<AppState>,
) -> bool {
    match msg {
        RelayIncomingMessage::StartStream => {
            if *streaming {
                debug!(connection_id = %connection_id, "start_stream on active connection");
                return true;
            }

            match app_state
                .session
                .attach(connection_id, delivery_tx.clone())
                .await
            {
                Ok(()) => {
                    *streaming = true;
                    info!(
                        connection_id = %connection_id,
                        connections = app_state.session.connection_count(),
                        "Relay stream started"
                    );
                    let _ = message_tx
                        .send(RelayMessageRoute::Outgoing(
                            RelayOutgoingMessage::StreamStarted {
                                connection_id: connection_id.to_string(),
                                sample_rate: app_state.session.config().sample_rate,
                            },
                        ))
                        .await;
                }
                Err(e) => {
                    error!(connection_id = %connection_id, error = %e, "Failed to start stream");
                    send_error(message_tx, e.code(), e.to_string()).await;
                }
            }
            true
        }
        RelayIncomingMessage::CreateResponse => {
            if !*streaming {
                send_error(
                    message_tx,
                    "not_streaming",
                    "Send start_stream before create_response".to_string(),
                )
                .await;
                return true;
            }
            if let Err(e) = app_state.session.request_response().await {
                warn!(connection_id = %connection_id, error = %e, "Failed to request response");
                send_error(message_tx, e.code(), e.to_string()).await;
            }
            true
        }
        RelayIncomingMessage::ResetAudio => {
            if !*streaming {
                send_error(
                    message_tx,
                    "not_streaming",
                    "Send start_stream before reset_audio".to_string(),
                )
                .await;
                return true;
            }
            let discarded_bytes = app_state.session.reset_input().await;
            let _ = message_tx
                .send(RelayMessageRoute::Outgoing(
                    RelayOutgoingMessage::AudioReset { discarded_bytes },
                ))
                .await;
            true
        }
    }
}

/// Send an error message to the client, ignoring channel closure
async fn send_error(
    message_tx: &mpsc::Sender<RelayMessageRoute>,
    code: &str,
    message: String,
) {
    let _ = message_tx
        .send(RelayMessageRoute::Outgoing(RelayOutgoingMessage::Error {
            code: Some(code.to_string()),
            message,
        }))
        .await;
}
