//! WebSocket handler for real-time chat
//!
//! One socket per session. Frames from a socket are handled strictly in
//! arrival order; a turn finishes before the next frame is read.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    extract::{
        Path, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
    routing::get,
};
use base64::Engine;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::ApiState;
use crate::chat::{ChatMessage, ChatSink, Element, Step, StepStatus};
use crate::orchestrator::{AudioChunk, IncomingMessage};
use crate::security::AuthenticatedUser;
use crate::{Error, Result};

/// Reference to a file stored through `/api/files`
#[derive(Debug, Clone, Deserialize)]
pub struct FileRef {
    pub id: Uuid,
}

/// Incoming WebSocket message from client
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsIncoming {
    /// Streamed audio fragment (base64 `data`)
    AudioChunk {
        #[serde(default)]
        is_start: bool,
        #[serde(default)]
        mime_type: String,
        data: String,
    },
    /// End of the current utterance
    AudioEnd {
        #[serde(default)]
        elements: Vec<FileRef>,
    },
    /// Typed message
    Message {
        #[serde(default)]
        content: String,
        #[serde(default)]
        attachments: Vec<FileRef>,
    },
    /// Ping to keep connection alive
    Ping,
}

/// Outgoing WebSocket message to client
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsOutgoing {
    /// Connection established
    Connected {
        session_id: String,
        user: AuthenticatedUser,
    },
    /// Chat message to render
    Message(ChatMessage),
    /// External call started
    StepStart { step: Step, name: &'static str },
    /// External call finished
    StepEnd {
        step: Step,
        name: &'static str,
        is_error: bool,
    },
    /// Error occurred
    Error { code: String, message: String },
    /// Pong response
    Pong,
}

impl WsOutgoing {
    fn error(e: &Error) -> Self {
        Self::Error {
            code: e.code().to_string(),
            message: e.to_string(),
        }
    }
}

/// Delivers turn output to the socket writer task
struct WsSink {
    tx: mpsc::Sender<WsOutgoing>,
}

#[async_trait]
impl ChatSink for WsSink {
    async fn post(&self, message: ChatMessage) -> Result<()> {
        self.tx
            .send(WsOutgoing::Message(message))
            .await
            .map_err(|_| Error::Channel("socket closed".to_string()))
    }

    async fn step(&self, step: Step, status: StepStatus) {
        let frame = match status {
            StepStatus::Started => WsOutgoing::StepStart {
                step,
                name: step.label(),
            },
            StepStatus::Finished | StepStatus::Failed => WsOutgoing::StepEnd {
                step,
                name: step.label(),
                is_error: status == StepStatus::Failed,
            },
        };
        let _ = self.tx.send(frame).await;
    }
}

/// Build WebSocket router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/chat/{session_id}", get(ws_upgrade))
        .with_state(state)
}

/// Handle WebSocket upgrade request
async fn ws_upgrade(
    State(state): State<Arc<ApiState>>,
    Path(session_id): Path<String>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, session_id))
}

/// Handle WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<ApiState>, session_id: String) {
    let (mut sender, mut receiver) = socket.split();

    let user = match state.sessions.get(&session_id).await {
        Ok(session) => {
            let mut session = session.lock().await;
            session.mark_connected();
            session.user.clone()
        }
        Err(e) => {
            tracing::warn!(session_id = %session_id, "rejecting WebSocket for unknown session");
            if let Ok(msg) = serde_json::to_string(&WsOutgoing::error(&e)) {
                let _ = sender.send(Message::Text(msg.into())).await;
            }
            return;
        }
    };

    // Create channel for sending messages back to client
    let (tx, mut rx) = mpsc::channel::<WsOutgoing>(32);

    let send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let msg = match serde_json::to_string(&frame) {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::error!(error = %e, "failed to serialize frame");
                    continue;
                }
            };
            if sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    tracing::info!(session_id = %session_id, user = %user.identifier, "WebSocket connected");

    let sink = WsSink { tx: tx.clone() };
    let _ = tx
        .send(WsOutgoing::Connected {
            session_id: session_id.clone(),
            user,
        })
        .await;

    if let Err(e) = state.orchestrator.on_chat_start(&session_id, &sink).await {
        report(&tx, &e).await;
    }

    while let Some(msg) = receiver.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!(error = %e, "WebSocket receive error");
                break;
            }
        };

        let incoming: WsIncoming = match serde_json::from_str(text.as_str()) {
            Ok(incoming) => incoming,
            Err(e) => {
                tracing::warn!(error = %e, "invalid frame");
                let _ = tx
                    .send(WsOutgoing::Error {
                        code: "bad_request".to_string(),
                        message: format!("invalid frame: {e}"),
                    })
                    .await;
                continue;
            }
        };

        if let Err(e) = handle_incoming(&state, &session_id, &sink, &tx, incoming).await {
            report(&tx, &e).await;
        }
    }

    drop(sink);
    drop(tx);
    let _ = send_task.await;

    state.end_session(&session_id).await;
    tracing::info!(session_id = %session_id, "WebSocket disconnected");
}

/// Dispatch one client frame to the orchestrator
async fn handle_incoming(
    state: &ApiState,
    session_id: &str,
    sink: &WsSink,
    tx: &mpsc::Sender<WsOutgoing>,
    incoming: WsIncoming,
) -> Result<()> {
    let orchestrator = &state.orchestrator;

    match incoming {
        WsIncoming::AudioChunk {
            is_start,
            mime_type,
            data,
        } => {
            let data = base64::engine::general_purpose::STANDARD
                .decode(data)
                .map_err(|e| Error::Attachment(format!("invalid audio data: {e}")))?;
            orchestrator
                .on_audio_chunk(
                    session_id,
                    AudioChunk {
                        is_start,
                        mime_type,
                        data,
                    },
                )
                .await
        }
        WsIncoming::AudioEnd { elements } => {
            let ids: Vec<Uuid> = elements.iter().map(|f| f.id).collect();
            let elements = state
                .uploads
                .resolve_all(session_id, &ids)
                .await?
                .into_iter()
                .map(Element::from)
                .collect();
            orchestrator.on_audio_end(session_id, elements, sink).await
        }
        WsIncoming::Message {
            content,
            attachments,
        } => {
            let ids: Vec<Uuid> = attachments.iter().map(|f| f.id).collect();
            let attachments = state.uploads.resolve_all(session_id, &ids).await?;
            orchestrator
                .on_message(
                    session_id,
                    IncomingMessage {
                        content,
                        attachments,
                    },
                    sink,
                )
                .await
        }
        WsIncoming::Ping => {
            let _ = tx.send(WsOutgoing::Pong).await;
            Ok(())
        }
    }
}

/// Log a failed turn and tell the client
async fn report(tx: &mpsc::Sender<WsOutgoing>, e: &Error) {
    tracing::error!(code = e.code(), error = %e, "turn failed");
    let _ = tx.send(WsOutgoing::error(e)).await;
}
