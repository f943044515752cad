//! Conversational backend integration
//!
//! The backend keeps cross-turn state keyed by user identity; this side is
//! stateless. A turn sends one [`DialogueRequest`] and renders the returned
//! [`Trace`] list to a single reply string.

mod voiceflow;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

pub use voiceflow::VoiceflowClient;

/// Intent sent to the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DialogueRequest {
    /// Start of a conversation
    Launch,
    /// Free text from the user
    Text { payload: String },
}

impl DialogueRequest {
    /// Build a text request
    #[must_use]
    pub fn text(payload: impl Into<String>) -> Self {
        Self::Text {
            payload: payload.into(),
        }
    }
}

/// One event in the backend's response list
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Trace {
    /// Trace type (`text`, `choice`, `cardV2`, ...)
    #[serde(rename = "type")]
    pub kind: String,

    /// Type-specific payload
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Trace {
    /// The `payload.message` string, if present
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.payload.get("message").and_then(serde_json::Value::as_str)
    }
}

/// How a trace list becomes reply text
///
/// Only one policy exists today. New trace types (cards, choices, ...) are
/// added here as new variants rather than handled ad hoc by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TraceRendering {
    /// Concatenate `payload.message` of `text` traces in order; drop the rest
    #[default]
    TextOnly,
}

impl TraceRendering {
    /// Render traces to reply text
    #[must_use]
    pub fn render(self, traces: &[Trace]) -> String {
        match self {
            Self::TextOnly => traces
                .iter()
                .filter(|t| t.kind == "text")
                .filter_map(Trace::message)
                .collect(),
        }
    }
}

/// Replace characters the backend's identity scheme disallows
///
/// `a@b.com` becomes `a-b-com`.
#[must_use]
pub fn normalize_user_id(identity: &str) -> String {
    identity.replace(['@', '.'], "-")
}

/// Stateful conversational backend
#[async_trait]
pub trait Dialogue: Send + Sync {
    /// Send one request on behalf of `user_id` and return the rendered reply
    ///
    /// # Errors
    ///
    /// Returns `DialogueBackend` on non-success status or unreadable response
    async fn interact(&self, user_id: &str, request: &DialogueRequest) -> Result<String>;
}
