//! Scripted upstream session for integration tests
//!
//! Records every lifecycle call and frame so tests can assert on the
//! relay session's behavior, and exposes the registered callbacks so tests
//! can inject upstream events without a network.

// Allow dead code in test infrastructure - not every test binary uses every helper
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use voice_relay::core::error::{RelayError, RelayResult};
use voice_relay::core::upstream::{
    AudioCallback, ConnectionState, ErrorCallback, RealtimeUpstream, ResponseDoneCallback,
    UpstreamAudio,
};

/// Shared observable state of a [`MockUpstream`]
#[derive(Default)]
pub struct MockState {
    /// Number of real connect attempts (idempotent short-circuits excluded)
    pub connect_calls: AtomicUsize,
    /// Number of disconnect calls
    pub disconnect_calls: AtomicUsize,
    /// Number of response requests
    pub response_requests: AtomicUsize,
    /// Frames forwarded via send_frame, in order
    pub frames: Mutex<Vec<Bytes>>,
    /// When set, connect attempts fail
    pub fail_connect: AtomicBool,
    /// Whether the mock is currently "connected"
    pub connected: AtomicBool,

    audio_callback: Mutex<Option<AudioCallback>>,
    error_callback: Mutex<Option<ErrorCallback>>,
    response_done_callback: Mutex<Option<ResponseDoneCallback>>,
}

impl MockState {
    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn disconnect_calls(&self) -> usize {
        self.disconnect_calls.load(Ordering::SeqCst)
    }

    pub fn response_requests(&self) -> usize {
        self.response_requests.load(Ordering::SeqCst)
    }

    pub fn frames(&self) -> Vec<Bytes> {
        self.frames.lock().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// Inject an assistant audio payload as if it arrived upstream
    pub async fn fire_audio(&self, audio: UpstreamAudio) {
        let callback = self.audio_callback.lock().clone();
        if let Some(cb) = callback {
            cb(audio).await;
        }
    }

    /// Inject an upstream error event
    pub async fn fire_error(&self, error: RelayError) {
        let callback = self.error_callback.lock().clone();
        if let Some(cb) = callback {
            cb(error).await;
        }
    }

    /// Inject a response completion event
    pub async fn fire_response_done(&self, response_id: &str) {
        let callback = self.response_done_callback.lock().clone();
        if let Some(cb) = callback {
            cb(response_id.to_string()).await;
        }
    }
}

/// A scripted in-memory upstream session
pub struct MockUpstream {
    state: Arc<MockState>,
}

impl MockUpstream {
    /// Build a mock and a handle to its observable state
    pub fn new() -> (Self, Arc<MockState>) {
        let state = Arc::new(MockState::default());
        (
            Self {
                state: state.clone(),
            },
            state,
        )
    }
}

#[async_trait]
impl RealtimeUpstream for MockUpstream {
    async fn ensure_connected(&mut self) -> RelayResult<()> {
        if self.state.connected.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.state.connect_calls.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_connect.load(Ordering::SeqCst) {
            return Err(RelayError::ConnectFailure("scripted failure".to_string()));
        }
        self.state.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&mut self) -> RelayResult<()> {
        self.state.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        self.state.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn state(&self) -> ConnectionState {
        if self.state.connected.load(Ordering::SeqCst) {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    fn is_ready(&self) -> bool {
        self.state.connected.load(Ordering::SeqCst)
    }

    async fn send_frame(&mut self, frame: Bytes) -> RelayResult<()> {
        if !self.is_ready() {
            return Err(RelayError::NotConnected);
        }
        self.state.frames.lock().push(frame);
        Ok(())
    }

    async fn request_response(&mut self) -> RelayResult<()> {
        if !self.is_ready() {
            return Err(RelayError::NotConnected);
        }
        self.state.response_requests.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn on_audio(&mut self, callback: AudioCallback) {
        *self.state.audio_callback.lock() = Some(callback);
    }

    fn on_error(&mut self, callback: ErrorCallback) {
        *self.state.error_callback.lock() = Some(callback);
    }

    fn on_response_done(&mut self, callback: ResponseDoneCallback) {
        *self.state.response_done_callback.lock() = Some(callback);
    }
}
