//! WebSocket chat integration tests
//!
//! Drives the real router over a socket with mock providers behind it

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use parley_gateway::api::{self, ApiState};
use parley_gateway::security::AuthConfig;
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

mod common;
use common::{Harness, spawn_server};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Serve the API and return its state plus a ws:// base URL
async fn start(upload_dir: &std::path::Path) -> (Harness, Arc<ApiState>, String) {
    let harness = Harness::default();
    let state = Arc::new(ApiState::new(
        harness.orchestrator.clone(),
        AuthConfig::default(),
        upload_dir.to_path_buf(),
    ));
    let base_url = spawn_server(api::router(state.clone())).await;
    let ws_url = base_url.replacen("http://", "ws://", 1);
    (harness, state, ws_url)
}

async fn connect(ws_url: &str, session_id: &str) -> Socket {
    let (socket, _) = connect_async(format!("{ws_url}/ws/chat/{session_id}"))
        .await
        .unwrap();
    socket
}

async fn send(socket: &mut Socket, frame: Value) {
    socket.send(Message::text(frame.to_string())).await.unwrap();
}

/// Next frame that is not step progress
async fn next_frame(socket: &mut Socket) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("no frame within 5s")
            .expect("socket closed")
            .unwrap();
        if !msg.is_text() {
            continue;
        }
        let frame: Value = serde_json::from_str(msg.to_text().unwrap()).unwrap();
        match frame["type"].as_str() {
            Some("step_start" | "step_end") => continue,
            _ => return frame,
        }
    }
}

async fn wait_until_closed(state: &ApiState) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !state.sessions.is_empty().await {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("session was not closed");
}

#[tokio::test]
async fn test_connect_sends_connected_then_launch_reply() {
    let dir = tempfile::tempdir().unwrap();
    let (harness, _state, ws_url) = start(dir.path()).await;
    let session_id = harness.open_session("me@voiceflow.com").await;

    let mut socket = connect(&ws_url, &session_id).await;

    let frame = next_frame(&mut socket).await;
    assert_eq!(frame["type"], "connected");
    assert_eq!(frame["session_id"], session_id.as_str());
    assert_eq!(frame["user"]["identifier"], "me@voiceflow.com");

    let frame = next_frame(&mut socket).await;
    assert_eq!(frame["type"], "message");
    assert_eq!(frame["kind"], "assistant_message");
    assert_eq!(frame["content"], "Welcome!");
}

#[tokio::test]
async fn test_unknown_session_gets_error_frame() {
    let dir = tempfile::tempdir().unwrap();
    let (_harness, _state, ws_url) = start(dir.path()).await;

    let mut socket = connect(&ws_url, "no-such-session").await;

    let frame = next_frame(&mut socket).await;
    assert_eq!(frame["type"], "error");
    assert_eq!(frame["code"], "session_not_found");
}

#[tokio::test]
async fn test_voice_turn_over_socket() {
    let dir = tempfile::tempdir().unwrap();
    let (harness, state, ws_url) = start(dir.path()).await;
    let session_id = harness.open_session("voiceflow").await;

    let mut socket = connect(&ws_url, &session_id).await;
    assert_eq!(next_frame(&mut socket).await["type"], "connected");
    assert_eq!(next_frame(&mut socket).await["content"], "Welcome!");

    // "AB" then "CD"
    let start = json!({
        "type": "audio_chunk",
        "is_start": true,
        "mime_type": "audio/wav",
        "data": "QUI="
    });
    send(&mut socket, start).await;
    send(&mut socket, json!({ "type": "audio_chunk", "data": "Q0Q=" })).await;
    send(&mut socket, json!({ "type": "audio_end" })).await;

    let user = next_frame(&mut socket).await;
    assert_eq!(user["type"], "message");
    assert_eq!(user["kind"], "user_message");
    assert_eq!(user["content"], "hello");

    let reply = next_frame(&mut socket).await;
    assert_eq!(reply["kind"], "assistant_message");
    assert_eq!(reply["content"], "echo: hello");
    assert_eq!(reply["elements"][0]["type"], "audio");
    assert_eq!(reply["elements"][0]["name"], "output_audio.wav");

    let calls = harness.transcriber.calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, b"ABCD".to_vec());
    assert_eq!(calls[0].2, "audio/wav");

    socket.close(None).await.unwrap();
    wait_until_closed(&state).await;
}

#[tokio::test]
async fn test_bad_audio_data_keeps_socket_open() {
    let dir = tempfile::tempdir().unwrap();
    let (harness, _state, ws_url) = start(dir.path()).await;
    let session_id = harness.open_session("voiceflow").await;

    let mut socket = connect(&ws_url, &session_id).await;
    next_frame(&mut socket).await;
    next_frame(&mut socket).await;

    send(
        &mut socket,
        json!({ "type": "audio_chunk", "is_start": true, "data": "not base64!" }),
    )
    .await;
    let frame = next_frame(&mut socket).await;
    assert_eq!(frame["type"], "error");
    assert_eq!(frame["code"], "attachment");

    send(&mut socket, json!({ "type": "ping" })).await;
    assert_eq!(next_frame(&mut socket).await["type"], "pong");

    socket.send(Message::text("{not json")).await.unwrap();
    assert_eq!(next_frame(&mut socket).await["code"], "bad_request");

    send(&mut socket, json!({ "type": "audio_end" })).await;
    assert_eq!(next_frame(&mut socket).await["code"], "no_active_recording");
}

#[tokio::test]
async fn test_disconnect_closes_session_and_releases_uploads() {
    let dir = tempfile::tempdir().unwrap();
    let (harness, state, ws_url) = start(dir.path()).await;
    let session_id = harness.open_session("voiceflow").await;
    let (_, attachment) = state
        .uploads
        .store(&session_id, "plate.png", "image/png", b"PNG")
        .await
        .unwrap();
    assert!(attachment.path.exists());

    let mut socket = connect(&ws_url, &session_id).await;
    assert_eq!(next_frame(&mut socket).await["type"], "connected");
    socket.close(None).await.unwrap();

    wait_until_closed(&state).await;
    assert!(!attachment.path.exists());
}
