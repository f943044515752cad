//! Chat messages exchanged with the UI
//!
//! The orchestrator never talks to a transport directly; it posts
//! [`ChatMessage`]s and step notifications to a [`ChatSink`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::attachments::Attachment;
use crate::voice::{Recording, SpeechAudio};

/// Author name shown on user-authored messages created by the gateway
pub const USER_AUTHOR: &str = "You";

/// Author name shown on assistant replies
pub const ASSISTANT_AUTHOR: &str = "Assistant";

/// Who a message is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    AssistantMessage,
    UserMessage,
}

/// A file shown alongside a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Element {
    /// Inline audio clip
    Audio {
        name: String,
        mime: String,
        #[serde(with = "base64_bytes")]
        content: Vec<u8>,
        auto_play: bool,
    },
    /// Reference to a stored file
    ///
    /// The server-side path is never sent to clients.
    File {
        name: String,
        mime: String,
        #[serde(skip_serializing, default)]
        path: std::path::PathBuf,
    },
}

impl Element {
    /// The user's own recording, not auto-played
    #[must_use]
    pub fn from_recording(recording: &Recording) -> Self {
        Self::Audio {
            name: recording.file_name(),
            mime: recording.mime_type.clone(),
            content: recording.data.clone(),
            auto_play: false,
        }
    }

    /// Synthesized reply audio, auto-played
    #[must_use]
    pub fn from_speech(audio: SpeechAudio) -> Self {
        Self::Audio {
            name: audio.name,
            mime: audio.mime_type,
            content: audio.data,
            auto_play: true,
        }
    }
}

impl From<Attachment> for Element {
    fn from(attachment: Attachment) -> Self {
        Self::File {
            name: attachment.name,
            mime: attachment.mime_type,
            path: attachment.path,
        }
    }
}

/// A message posted to the chat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: uuid::Uuid,
    pub author: String,
    pub kind: MessageKind,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub elements: Vec<Element>,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// An assistant reply
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ASSISTANT_AUTHOR, MessageKind::AssistantMessage, content.into())
    }

    /// A message attributed to the user
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(USER_AUTHOR, MessageKind::UserMessage, content.into())
    }

    fn new(author: &str, kind: MessageKind, content: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            author: author.to_string(),
            kind,
            content,
            elements: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Attach elements
    #[must_use]
    pub fn with_elements(mut self, elements: impl IntoIterator<Item = Element>) -> Self {
        self.elements.extend(elements);
        self
    }
}

/// External call shown as a progress step in the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    SpeechToText,
    ConversationManager,
    TextToSpeech,
    ImageToText,
}

impl Step {
    /// Human-readable step label
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::SpeechToText => "Speech to Text (OpenAI Whisper)",
            Self::ConversationManager => "Conversation Manager (Voiceflow)",
            Self::TextToSpeech => "Text to Speech (ElevenLabs)",
            Self::ImageToText => "Image to Text (OpenAI Vision)",
        }
    }
}

/// Where a step is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Started,
    Finished,
    Failed,
}

/// Destination for messages produced by a turn
#[async_trait]
pub trait ChatSink: Send + Sync {
    /// Post a message to the chat
    ///
    /// # Errors
    ///
    /// Returns error if the message cannot be delivered
    async fn post(&self, message: ChatMessage) -> Result<()>;

    /// Report step progress
    ///
    /// Default implementation is a no-op for sinks that don't show steps
    async fn step(&self, _step: Step, _status: StepStatus) {}
}

/// Serialize audio bytes as standard base64
mod base64_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(serde::de::Error::custom)
    }
}
