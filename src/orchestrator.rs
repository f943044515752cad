//! Turn orchestration
//!
//! Maps each UI event to the external calls it needs, in order:
//!
//! ```text
//! chat start   ── launch ─────────────────────────────► reply
//! audio end    ── transcribe ─► converse ─► synthesize ► reply + audio
//! image message── caption ────► converse ──────────────► reply
//! text message ───────────────► converse ──────────────► reply
//! ```
//!
//! Every call is awaited before the next starts. Any failure aborts the turn:
//! no retry and no partial reply. In particular, when synthesis fails after a
//! successful dialogue call the reply text is *not* posted on its own.

use std::future::Future;
use std::sync::Arc;

use serde::Deserialize;

use crate::attachments::{Attachment, ImageCaptioner, first_image};
use crate::chat::{ChatMessage, ChatSink, Element, Step, StepStatus};
use crate::dialogue::{Dialogue, DialogueRequest};
use crate::session::{SessionRegistry, SharedSession, TurnState};
use crate::voice::{Synthesizer, Transcriber};
use crate::Result;

/// One streamed fragment of an utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    /// First chunk of a new utterance
    pub is_start: bool,

    /// MIME type of the stream (read on the start chunk)
    pub mime_type: String,

    /// Raw bytes
    pub data: Vec<u8>,
}

/// A typed message from the user, possibly with files
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct IncomingMessage {
    /// Message text
    #[serde(default)]
    pub content: String,

    /// Stored attachments
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// External services a turn may call
#[derive(Clone)]
pub struct Services {
    pub transcriber: Arc<dyn Transcriber>,
    pub dialogue: Arc<dyn Dialogue>,
    pub synthesizer: Arc<dyn Synthesizer>,
    pub captioner: Arc<dyn ImageCaptioner>,
}

/// Sequences external calls for each session event
pub struct TurnOrchestrator {
    services: Services,
    sessions: Arc<SessionRegistry>,
}

impl TurnOrchestrator {
    /// Create an orchestrator over a session registry
    #[must_use]
    pub const fn new(services: Services, sessions: Arc<SessionRegistry>) -> Self {
        Self { services, sessions }
    }

    /// Session registry backing this orchestrator
    #[must_use]
    pub const fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    /// Greet a newly started session with the backend's launch reply
    ///
    /// # Errors
    ///
    /// Returns error if the session is unknown or the dialogue call fails
    pub async fn on_chat_start(&self, session_id: &str, sink: &dyn ChatSink) -> Result<()> {
        let session = self.sessions.get(session_id).await?;
        let user_id = Self::begin(&session, TurnState::Conversing).await;

        let result = async {
            let reply = self.converse(&user_id, DialogueRequest::Launch, sink).await?;
            sink.post(ChatMessage::assistant(reply)).await
        }
        .await;

        Self::finish(&session, &result).await;
        result
    }

    /// Buffer one audio chunk
    ///
    /// # Errors
    ///
    /// Returns `NoActiveRecording` for a continuation chunk with no start
    pub async fn on_audio_chunk(&self, session_id: &str, chunk: AudioChunk) -> Result<()> {
        let session = self.sessions.get(session_id).await?;
        let mut session = session.lock().await;

        if chunk.is_start {
            session.recorder.start(&chunk.mime_type);
            session.transition(TurnState::Recording);
        }

        session.recorder.append(&chunk.data)
    }

    /// Finish an utterance: transcribe, converse, synthesize, reply
    ///
    /// `elements` are extra files the UI attached to the utterance; they are
    /// shown on the user's transcript message.
    ///
    /// # Errors
    ///
    /// Returns error if no recording is in progress or any call fails
    pub async fn on_audio_end(
        &self,
        session_id: &str,
        elements: Vec<Element>,
        sink: &dyn ChatSink,
    ) -> Result<()> {
        let session = self.sessions.get(session_id).await?;

        let result = self.voice_turn(&session, elements, sink).await;
        Self::finish(&session, &result).await;
        result
    }

    /// Handle a typed message, captioning the first image if there is one
    ///
    /// # Errors
    ///
    /// Returns error if the session is unknown or any call fails
    pub async fn on_message(
        &self,
        session_id: &str,
        message: IncomingMessage,
        sink: &dyn ChatSink,
    ) -> Result<()> {
        let session = self.sessions.get(session_id).await?;

        let result = self.message_turn(&session, message, sink).await;
        Self::finish(&session, &result).await;
        result
    }

    async fn voice_turn(
        &self,
        session: &SharedSession,
        elements: Vec<Element>,
        sink: &dyn ChatSink,
    ) -> Result<()> {
        let (recording, user_id) = {
            let mut session = session.lock().await;
            let recording = session.recorder.finalize()?;
            session.transition(TurnState::Transcribing);
            (recording, session.user.identifier.clone())
        };

        tracing::info!(
            user = %user_id,
            audio_bytes = recording.data.len(),
            mime_type = %recording.mime_type,
            "utterance complete"
        );

        let transcript = with_step(
            sink,
            Step::SpeechToText,
            self.services.transcriber.transcribe(
                &recording.data,
                &recording.file_name(),
                &recording.mime_type,
            ),
        )
        .await?;

        let user_message = ChatMessage::user(transcript.clone())
            .with_elements(std::iter::once(Element::from_recording(&recording)).chain(elements));
        sink.post(user_message).await?;

        Self::transition(session, TurnState::Conversing).await;
        let reply = self
            .converse(&user_id, DialogueRequest::text(transcript), sink)
            .await?;

        Self::transition(session, TurnState::Synthesizing).await;
        let speech = with_step(
            sink,
            Step::TextToSpeech,
            self.services.synthesizer.synthesize(&reply, &recording.mime_type),
        )
        .await?;

        sink.post(ChatMessage::assistant(reply).with_elements([Element::from_speech(speech)]))
            .await
    }

    async fn message_turn(
        &self,
        session: &SharedSession,
        message: IncomingMessage,
        sink: &dyn ChatSink,
    ) -> Result<()> {
        let user_id = session.lock().await.user.identifier.clone();

        let payload = if let Some(image) = first_image(&message.attachments) {
            Self::transition(session, TurnState::CaptioningImage).await;
            tracing::info!(user = %user_id, image = %image.name, "captioning image message");
            with_step(
                sink,
                Step::ImageToText,
                self.services.captioner.caption(&image.path),
            )
            .await?
        } else {
            message.content
        };

        Self::transition(session, TurnState::Conversing).await;
        let reply = self
            .converse(&user_id, DialogueRequest::text(payload), sink)
            .await?;

        sink.post(ChatMessage::assistant(reply)).await
    }

    async fn converse(
        &self,
        user_id: &str,
        request: DialogueRequest,
        sink: &dyn ChatSink,
    ) -> Result<String> {
        with_step(
            sink,
            Step::ConversationManager,
            self.services.dialogue.interact(user_id, &request),
        )
        .await
    }

    /// Enter `state` and return the session's user identity
    async fn begin(session: &SharedSession, state: TurnState) -> String {
        let mut session = session.lock().await;
        session.transition(state);
        session.user.identifier.clone()
    }

    async fn transition(session: &SharedSession, state: TurnState) {
        session.lock().await.transition(state);
    }

    async fn finish(session: &SharedSession, result: &Result<()>) {
        let mut session = session.lock().await;
        if let Err(e) = result {
            tracing::warn!(
                session_id = %session.id,
                state = %session.state,
                error = %e,
                "turn aborted"
            );
        }
        // A message turn may interleave with an utterance still being streamed
        let next = if session.recorder.is_recording() {
            TurnState::Recording
        } else {
            TurnState::Idle
        };
        session.transition(next);
    }
}

/// Run one external call, reporting its progress to the sink
async fn with_step<T, F>(sink: &dyn ChatSink, step: Step, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    sink.step(step, StepStatus::Started).await;
    let result = call.await;
    let status = if result.is_ok() {
        StepStatus::Finished
    } else {
        StepStatus::Failed
    };
    sink.step(step, status).await;
    result
}
