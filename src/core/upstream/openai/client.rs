//! OpenAI Realtime API upstream session.
//!
//! Implements [`RealtimeUpstream`] over the WebSocket-based Realtime API.
//!
//! - Endpoint: `wss://api.openai.com/v1/realtime?model=<model>`
//! - Protocol: WebSocket with JSON events
//! - Audio: PCM 16-bit, 24kHz, mono, little-endian, base64 encoded
//!
//! The session never reconnects on its own. When the backend drops the
//! connection, the error callback fires once and the session reads as
//! `Disconnected`; the owner decides whether to call `ensure_connected`
//! again. Automatic retry here would risk duplicating or reordering audio
//! already submitted on the dead connection.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};

use super::config::{
    OPENAI_REALTIME_SAMPLE_RATE, OPENAI_REALTIME_URL, OpenAiRealtimeModel, OpenAiRealtimeVoice,
};
use super::messages::{ClientEvent, ServerEvent, SessionConfig, TurnDetection};
use crate::core::error::{RelayError, RelayResult};
use crate::core::upstream::base::{
    AudioCallback, ConnectionState, ErrorCallback, RealtimeUpstream, ResponseDoneCallback,
    UpstreamAudio, UpstreamConfig,
};

/// Channel capacity for WebSocket message sending.
const WS_CHANNEL_CAPACITY: usize = 256;

/// OpenAI Realtime upstream session.
///
/// Mutable state is shared with the spawned connection task through `Arc`
/// wrappers; the `connected` flag is an `AtomicBool` for lock-free checks.
pub struct OpenAiUpstream {
    config: UpstreamConfig,
    model: OpenAiRealtimeModel,
    voice: OpenAiRealtimeVoice,

    state: Arc<RwLock<ConnectionState>>,
    connected: Arc<AtomicBool>,
    session_id: Arc<RwLock<Option<String>>>,

    ws_sender: Arc<Mutex<Option<mpsc::Sender<ClientEvent>>>>,
    connection_handle: Arc<Mutex<Option<JoinHandle<()>>>>,

    audio_callback: Arc<Mutex<Option<AudioCallback>>>,
    error_callback: Arc<Mutex<Option<ErrorCallback>>>,
    response_done_callback: Arc<Mutex<Option<ResponseDoneCallback>>>,
}

impl OpenAiUpstream {
    /// Create a new upstream session from configuration.
    pub fn new(config: UpstreamConfig) -> RelayResult<Self> {
        if config.api_key.is_empty() {
            return Err(RelayError::InvalidConfiguration(
                "API key is required".to_string(),
            ));
        }

        let model = if config.model.is_empty() {
            OpenAiRealtimeModel::default()
        } else {
            OpenAiRealtimeModel::from_str_or_default(&config.model)
        };

        let voice = match config.voice {
            Some(ref v) => OpenAiRealtimeVoice::from_str_or_default(v),
            None => OpenAiRealtimeVoice::default(),
        };

        Ok(Self {
            config,
            model,
            voice,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            connected: Arc::new(AtomicBool::new(false)),
            session_id: Arc::new(RwLock::new(None)),
            ws_sender: Arc::new(Mutex::new(None)),
            connection_handle: Arc::new(Mutex::new(None)),
            audio_callback: Arc::new(Mutex::new(None)),
            error_callback: Arc::new(Mutex::new(None)),
            response_done_callback: Arc::new(Mutex::new(None)),
        })
    }

    /// The configured model.
    pub fn model(&self) -> OpenAiRealtimeModel {
        self.model
    }

    /// The backend session ID, if a session has been created.
    pub async fn session_id(&self) -> Option<String> {
        self.session_id.read().await.clone()
    }

    fn build_ws_url(&self) -> String {
        format!("{}?model={}", OPENAI_REALTIME_URL, self.model.as_str())
    }

    fn build_request(&self) -> RelayResult<http::Request<()>> {
        http::Request::builder()
            .uri(self.build_ws_url())
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("OpenAI-Beta", "realtime=v1")
            .header(
                "Sec-WebSocket-Key",
                tungstenite::handshake::client::generate_key(),
            )
            .header("Sec-WebSocket-Version", "13")
            .header("Connection", "Upgrade")
            .header("Upgrade", "websocket")
            .header("Host", "api.openai.com")
            .body(())
            .map_err(|e| RelayError::ConnectFailure(e.to_string()))
    }

    /// Initial session configuration: pcm16 both ways, no server VAD. The
    /// relay commits the input buffer itself when a response is requested.
    fn build_session_config(&self) -> SessionConfig {
        SessionConfig {
            modalities: Some(vec!["text".to_string(), "audio".to_string()]),
            instructions: self.config.instructions.clone(),
            voice: Some(self.voice.as_str().to_string()),
            input_audio_format: Some("pcm16".to_string()),
            output_audio_format: Some("pcm16".to_string()),
            turn_detection: Some(TurnDetection::None {}),
            temperature: self.config.temperature,
        }
    }

    async fn send_event(&self, event: ClientEvent) -> RelayResult<()> {
        if let Some(sender) = self.ws_sender.lock().await.as_ref() {
            sender
                .send(event)
                .await
                .map_err(|e| RelayError::WebSocketError(e.to_string()))?;
            Ok(())
        } else {
            Err(RelayError::NotConnected)
        }
    }

    /// Dispatch one server event to the registered callbacks.
    async fn handle_server_event(
        event: ServerEvent,
        audio_cb: &Arc<Mutex<Option<AudioCallback>>>,
        error_cb: &Arc<Mutex<Option<ErrorCallback>>>,
        response_done_cb: &Arc<Mutex<Option<ResponseDoneCallback>>>,
        session_id: &Arc<RwLock<Option<String>>>,
    ) {
        match event {
            ServerEvent::SessionCreated { session } => {
                tracing::info!(session_id = %session.id, "Upstream realtime session created");
                *session_id.write().await = Some(session.id);
            }

            ServerEvent::SessionUpdated { session } => {
                tracing::debug!(session_id = %session.id, "Upstream session updated");
            }

            ServerEvent::Error { error } => {
                tracing::error!(
                    error_type = %error.error_type,
                    message = %error.message,
                    "Upstream realtime error"
                );
                if let Some(cb) = error_cb.lock().await.as_ref() {
                    cb(RelayError::UpstreamError(format!(
                        "{}: {}",
                        error.error_type, error.message
                    )))
                    .await;
                }
            }

            ServerEvent::AudioDelta {
                delta,
                item_id,
                response_id,
            } => match ServerEvent::decode_audio_delta(&delta) {
                Ok(audio_bytes) => {
                    if let Some(cb) = audio_cb.lock().await.as_ref() {
                        cb(UpstreamAudio {
                            data: Bytes::from(audio_bytes),
                            sample_rate: OPENAI_REALTIME_SAMPLE_RATE,
                            item_id: Some(item_id),
                            response_id: Some(response_id),
                        })
                        .await;
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to decode audio delta: {}", e);
                    if let Some(cb) = error_cb.lock().await.as_ref() {
                        cb(RelayError::InvalidAudioPayload(e.to_string())).await;
                    }
                }
            },

            ServerEvent::AudioDone { item_id, .. } => {
                tracing::debug!(item_id = %item_id, "Upstream audio item complete");
            }

            ServerEvent::ResponseDone { response } => {
                tracing::debug!(response_id = %response.id, status = ?response.status, "Response done");
                if let Some(cb) = response_done_cb.lock().await.as_ref() {
                    cb(response.id).await;
                }
            }

            ServerEvent::InputAudioBufferCommitted { item_id } => {
                tracing::debug!(item_id = %item_id, "Input audio buffer committed");
            }

            ServerEvent::Unhandled => {
                tracing::trace!("Unhandled upstream event");
            }
        }
    }
}

#[async_trait]
impl RealtimeUpstream for OpenAiUpstream {
    async fn ensure_connected(&mut self) -> RelayResult<()> {
        if self.connected.load(Ordering::SeqCst) {
            return Ok(());
        }

        *self.state.write().await = ConnectionState::Connecting;

        let request = match self.build_request() {
            Ok(req) => req,
            Err(e) => {
                *self.state.write().await = ConnectionState::Disconnected;
                return Err(e);
            }
        };

        let timeout = Duration::from_millis(self.config.connect_timeout_ms);
        let connect = tokio_tungstenite::connect_async(request);
        let ws_stream = match tokio::time::timeout(timeout, connect).await {
            Ok(Ok((stream, _response))) => stream,
            Ok(Err(e)) => {
                *self.state.write().await = ConnectionState::Disconnected;
                return Err(RelayError::ConnectFailure(e.to_string()));
            }
            Err(_) => {
                *self.state.write().await = ConnectionState::Disconnected;
                return Err(RelayError::Timeout(format!(
                    "upstream connect exceeded {}ms",
                    self.config.connect_timeout_ms
                )));
            }
        };

        tracing::info!(model = %self.model, "Connected to upstream realtime API");

        let (mut ws_sink, mut ws_stream) = ws_stream.split();

        let (tx, mut rx) = mpsc::channel::<ClientEvent>(WS_CHANNEL_CAPACITY);
        *self.ws_sender.lock().await = Some(tx);

        let audio_cb = self.audio_callback.clone();
        let error_cb = self.error_callback.clone();
        let response_done_cb = self.response_done_callback.clone();
        let session_id = self.session_id.clone();
        let state = self.state.clone();
        let ws_sender = self.ws_sender.clone();
        let connected = self.connected.clone();

        let handle = tokio::spawn(async move {
            let mut server_closed = false;

            loop {
                tokio::select! {
                    Some(event) = rx.recv() => {
                        let json = match serde_json::to_string(&event) {
                            Ok(j) => j,
                            Err(e) => {
                                tracing::error!("Failed to serialize client event: {}", e);
                                continue;
                            }
                        };

                        if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                            tracing::error!("Failed to send upstream message: {}", e);
                            server_closed = true;
                            break;
                        }
                    }

                    Some(msg) = ws_stream.next() => {
                        match msg {
                            Ok(Message::Text(text)) => {
                                match serde_json::from_str::<ServerEvent>(&text) {
                                    Ok(event) => {
                                        Self::handle_server_event(
                                            event,
                                            &audio_cb,
                                            &error_cb,
                                            &response_done_cb,
                                            &session_id,
                                        ).await;
                                    }
                                    Err(e) => {
                                        tracing::warn!("Failed to parse server event: {} - {}", e, text);
                                    }
                                }
                            }
                            Ok(Message::Close(_)) => {
                                tracing::info!("Upstream WebSocket closed by server");
                                server_closed = true;
                                break;
                            }
                            Ok(Message::Ping(data)) => {
                                if let Err(e) = ws_sink.send(Message::Pong(data)).await {
                                    tracing::error!("Failed to send pong: {}", e);
                                }
                            }
                            Err(e) => {
                                tracing::error!("Upstream WebSocket error: {}", e);
                                server_closed = true;
                                break;
                            }
                            _ => {}
                        }
                    }

                    else => break,
                }
            }

            // No automatic reconnection: surface the loss once and leave the
            // session disconnected for the owner to rebuild explicitly.
            connected.store(false, Ordering::SeqCst);
            *state.write().await = ConnectionState::Disconnected;
            *ws_sender.lock().await = None;

            if server_closed
                && let Some(cb) = error_cb.lock().await.as_ref()
            {
                cb(RelayError::ConnectFailure(
                    "Upstream connection lost".to_string(),
                ))
                .await;
            }

            tracing::info!("Upstream connection task ended");
        });

        *self.connection_handle.lock().await = Some(handle);

        // Configure the session before any audio flows; the session only
        // reads Connected once the configuration event is queued.
        let session_config = self.build_session_config();
        if let Err(e) = self
            .send_event(ClientEvent::SessionUpdate {
                session: session_config,
            })
            .await
        {
            let _ = self.disconnect().await;
            return Err(e);
        }

        self.connected.store(true, Ordering::SeqCst);
        *self.state.write().await = ConnectionState::Connected;

        Ok(())
    }

    async fn disconnect(&mut self) -> RelayResult<()> {
        *self.ws_sender.lock().await = None;

        if let Some(handle) = self.connection_handle.lock().await.take() {
            handle.abort();
        }

        self.connected.store(false, Ordering::SeqCst);
        *self.state.write().await = ConnectionState::Disconnected;
        *self.session_id.write().await = None;

        tracing::info!("Disconnected from upstream realtime API");
        Ok(())
    }

    fn state(&self) -> ConnectionState {
        match self.state.try_read() {
            Ok(guard) => *guard,
            // Transition in flight; fall back to the atomic flag
            Err(_) => {
                if self.connected.load(Ordering::SeqCst) {
                    ConnectionState::Connected
                } else {
                    ConnectionState::Disconnected
                }
            }
        }
    }

    fn is_ready(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send_frame(&mut self, frame: Bytes) -> RelayResult<()> {
        if !self.is_ready() {
            return Err(RelayError::NotConnected);
        }

        self.send_event(ClientEvent::audio_append(&frame)).await
    }

    async fn request_response(&mut self) -> RelayResult<()> {
        if !self.is_ready() {
            return Err(RelayError::NotConnected);
        }

        self.send_event(ClientEvent::InputAudioBufferCommit).await?;
        self.send_event(ClientEvent::ResponseCreate).await
    }

    fn on_audio(&mut self, callback: AudioCallback) {
        if let Ok(mut guard) = self.audio_callback.try_lock() {
            *guard = Some(callback);
        } else {
            let cb = self.audio_callback.clone();
            tokio::spawn(async move {
                *cb.lock().await = Some(callback);
            });
        }
    }

    fn on_error(&mut self, callback: ErrorCallback) {
        if let Ok(mut guard) = self.error_callback.try_lock() {
            *guard = Some(callback);
        } else {
            let cb = self.error_callback.clone();
            tokio::spawn(async move {
                *cb.lock().await = Some(callback);
            });
        }
    }

    fn on_response_done(&mut self, callback: ResponseDoneCallback) {
        if let Ok(mut guard) = self.response_done_callback.try_lock() {
            *guard = Some(callback);
        } else {
            let cb = self.response_done_callback.clone();
            tokio::spawn(async move {
                *cb.lock().await = Some(callback);
            });
        }
    }
}
