//! Relay Session Integration Tests
//!
//! Exercises the shared session against a scripted upstream: lifecycle
//! (first attach connects, last detach disconnects), frame chunking and
//! ordering, response requests, and broadcast fan-out with failure
//! isolation.
//!
//! Run: cargo test --test relay_session

mod mock_upstream;

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use uuid::Uuid;

use mock_upstream::{MockState, MockUpstream};
use voice_relay::core::error::RelayError;
use voice_relay::core::relay::{Delivery, RelaySession, RelaySessionConfig};
use voice_relay::core::upstream::{ConnectionState, UpstreamAudio};

const FRAME_BYTES: usize = 4800;

/// Build a session over a scripted upstream
fn make_session() -> (Arc<RelaySession>, Arc<MockState>) {
    let (mock, state) = MockUpstream::new();
    let session = RelaySession::new(Box::new(mock), RelaySessionConfig::default());
    (session, state)
}

/// Attach a connection with a delivery channel, panicking on failure
async fn attach(session: &Arc<RelaySession>) -> (Uuid, mpsc::Receiver<Delivery>) {
    let id = Uuid::new_v4();
    let (tx, rx) = mpsc::channel(64);
    session.attach(id, tx).await.expect("attach should succeed");
    (id, rx)
}

fn pcm(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_first_attach_connects_upstream() {
    let (session, state) = make_session();
    assert_eq!(session.upstream_state().await, ConnectionState::Disconnected);

    let (_id, _rx) = attach(&session).await;

    assert_eq!(state.connect_calls(), 1);
    assert_eq!(session.upstream_state().await, ConnectionState::Connected);
    assert_eq!(session.connection_count(), 1);
}

#[tokio::test]
async fn test_second_attach_does_not_reconnect() {
    let (session, state) = make_session();
    let (_a, _rx_a) = attach(&session).await;
    let (_b, _rx_b) = attach(&session).await;

    assert_eq!(state.connect_calls(), 1);
    assert_eq!(session.connection_count(), 2);
}

#[tokio::test]
async fn test_last_detach_disconnects_upstream() {
    let (session, state) = make_session();
    let (a, _rx_a) = attach(&session).await;
    let (b, _rx_b) = attach(&session).await;

    session.detach(a).await;
    assert_eq!(state.disconnect_calls(), 0);
    assert!(state.is_connected());

    session.detach(b).await;
    assert_eq!(state.disconnect_calls(), 1);
    assert!(!state.is_connected());
    assert_eq!(session.connection_count(), 0);
}

#[tokio::test]
async fn test_failed_connect_rolls_back_attachment() {
    let (session, state) = make_session();
    state.set_fail_connect(true);

    let id = Uuid::new_v4();
    let (tx, _rx) = mpsc::channel(64);
    let err = session.attach(id, tx).await.expect_err("connect should fail");
    assert!(matches!(err, RelayError::ConnectFailure(_)));
    assert_eq!(session.connection_count(), 0);
    assert_eq!(session.upstream_state().await, ConnectionState::Disconnected);

    // A later attempt succeeds once the upstream recovers
    state.set_fail_connect(false);
    let (_id, _rx) = attach(&session).await;
    assert_eq!(session.connection_count(), 1);
    assert!(state.is_connected());
}

#[tokio::test]
async fn test_detach_discards_partial_frame() {
    let (session, state) = make_session();
    let (a, _rx_a) = attach(&session).await;
    let (b, _rx_b) = attach(&session).await;

    // Leave 100 bytes buffered, then cycle through empty
    session.append_audio(&pcm(FRAME_BYTES + 100)).await.unwrap();
    session.detach(a).await;
    session.detach(b).await;

    // Reconnect and confirm the stale remainder is gone: a fresh full
    // frame yields exactly one upstream frame
    let (_c, _rx_c) = attach(&session).await;
    let frames_before = state.frames().len();
    let sent = session.append_audio(&pcm(FRAME_BYTES)).await.unwrap();
    assert_eq!(sent, 1);
    assert_eq!(state.frames().len(), frames_before + 1);
    assert_eq!(state.frames().last().unwrap().len(), FRAME_BYTES);
}

// ============================================================================
// Input audio
// ============================================================================

#[tokio::test]
async fn test_append_forwards_complete_frames_in_order() {
    let (session, state) = make_session();
    let (_id, _rx) = attach(&session).await;

    let data = pcm(FRAME_BYTES * 2);
    let sent = session.append_audio(&data).await.unwrap();
    assert_eq!(sent, 2);

    let frames = state.frames();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0], Bytes::from(data[..FRAME_BYTES].to_vec()));
    assert_eq!(frames[1], Bytes::from(data[FRAME_BYTES..].to_vec()));
}

#[tokio::test]
async fn test_append_buffers_remainder_across_calls() {
    let (session, state) = make_session();
    let (_id, _rx) = attach(&session).await;

    assert_eq!(session.append_audio(&pcm(FRAME_BYTES + 200)).await.unwrap(), 1);
    assert_eq!(state.frames().len(), 1);

    // The 200-byte remainder completes into the next frame
    assert_eq!(session.append_audio(&pcm(FRAME_BYTES - 200)).await.unwrap(), 1);
    assert_eq!(state.frames().len(), 2);
    assert_eq!(state.frames()[1].len(), FRAME_BYTES);
}

#[tokio::test]
async fn test_append_without_connection_fails() {
    let (session, _state) = make_session();

    let err = session
        .append_audio(&pcm(FRAME_BYTES))
        .await
        .expect_err("send should fail while disconnected");
    assert!(matches!(err, RelayError::NotConnected));
}

#[tokio::test]
async fn test_reset_discards_buffered_remainder() {
    let (session, state) = make_session();
    let (_id, _rx) = attach(&session).await;

    session.append_audio(&pcm(300)).await.unwrap();
    assert_eq!(session.reset_input().await, 300);
    assert_eq!(session.reset_input().await, 0);

    // Nothing was forwarded for the discarded bytes
    assert!(state.frames().is_empty());
}

// ============================================================================
// Response requests
// ============================================================================

#[tokio::test]
async fn test_request_response_flushes_partial_frame() {
    let (session, state) = make_session();
    let (_id, _rx) = attach(&session).await;

    session.append_audio(&pcm(FRAME_BYTES + 123)).await.unwrap();
    session.request_response().await.unwrap();

    let frames = state.frames();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[1].len(), 123);
    assert_eq!(state.response_requests(), 1);
}

#[tokio::test]
async fn test_request_response_without_buffered_tail() {
    let (session, state) = make_session();
    let (_id, _rx) = attach(&session).await;

    session.append_audio(&pcm(FRAME_BYTES)).await.unwrap();
    session.request_response().await.unwrap();

    assert_eq!(state.frames().len(), 1);
    assert_eq!(state.response_requests(), 1);
}

#[tokio::test]
async fn test_request_response_without_connection_fails() {
    let (session, _state) = make_session();
    let err = session
        .request_response()
        .await
        .expect_err("request should fail while disconnected");
    assert!(matches!(err, RelayError::NotConnected));
}

// ============================================================================
// Broadcast fan-out
// ============================================================================

fn upstream_audio(len: usize) -> UpstreamAudio {
    UpstreamAudio {
        data: Bytes::from(pcm(len)),
        sample_rate: 24000,
        item_id: None,
        response_id: Some("resp_1".to_string()),
    }
}

#[tokio::test]
async fn test_audio_fans_out_to_all_connections() {
    let (session, state) = make_session();
    let (_a, mut rx_a) = attach(&session).await;
    let (_b, mut rx_b) = attach(&session).await;

    state.fire_audio(upstream_audio(960)).await;

    for rx in [&mut rx_a, &mut rx_b] {
        match rx.recv().await.expect("delivery expected") {
            Delivery::Audio(audio) => assert_eq!(audio.len(), 960),
            other => panic!("Expected audio delivery, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_dead_connection_does_not_block_others() {
    let (session, state) = make_session();
    let (_a, rx_a) = attach(&session).await;
    let (_b, mut rx_b) = attach(&session).await;

    // First receiver goes away without detaching
    drop(rx_a);

    state.fire_audio(upstream_audio(960)).await;

    match rx_b.recv().await.expect("delivery expected") {
        Delivery::Audio(audio) => assert_eq!(audio.len(), 960),
        other => panic!("Expected audio delivery, got {other:?}"),
    }
}

#[tokio::test]
async fn test_invalid_payload_becomes_error_signal() {
    let (session, state) = make_session();
    let (_id, mut rx) = attach(&session).await;

    // Odd byte count cannot be 16-bit PCM
    state.fire_audio(upstream_audio(961)).await;

    match rx.recv().await.expect("delivery expected") {
        Delivery::Error { code, .. } => assert_eq!(code, "invalid_audio_payload"),
        other => panic!("Expected error delivery, got {other:?}"),
    }
}

#[tokio::test]
async fn test_empty_payload_becomes_error_signal() {
    let (session, state) = make_session();
    let (_id, mut rx) = attach(&session).await;

    state.fire_audio(upstream_audio(0)).await;

    match rx.recv().await.expect("delivery expected") {
        Delivery::Error { code, .. } => assert_eq!(code, "invalid_audio_payload"),
        other => panic!("Expected error delivery, got {other:?}"),
    }
}

#[tokio::test]
async fn test_response_done_fans_out() {
    let (session, state) = make_session();
    let (_id, mut rx) = attach(&session).await;

    state.fire_response_done("resp_42").await;

    match rx.recv().await.expect("delivery expected") {
        Delivery::ResponseDone(id) => assert_eq!(id, "resp_42"),
        other => panic!("Expected response done delivery, got {other:?}"),
    }
}

#[tokio::test]
async fn test_upstream_error_fans_out() {
    let (session, state) = make_session();
    let (_id, mut rx) = attach(&session).await;

    state
        .fire_error(RelayError::UpstreamError("boom".to_string()))
        .await;

    match rx.recv().await.expect("delivery expected") {
        Delivery::Error { code, message } => {
            assert_eq!(code, "upstream_error");
            assert!(message.contains("boom"));
        }
        other => panic!("Expected error delivery, got {other:?}"),
    }
}
