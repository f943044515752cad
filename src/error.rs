//! Error types for Parley gateway

use thiserror::Error;

/// Result type alias for Parley operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Parley gateway
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio appended or finalized without a recording in progress
    #[error("no active recording")]
    NoActiveRecording,

    /// Speech-to-text error
    #[error("transcription failed: {0}")]
    TranscriptionFailed(String),

    /// Conversational backend error
    #[error("dialogue backend error: {0}")]
    DialogueBackend(String),

    /// Text-to-speech error
    #[error("synthesis failed: {0}")]
    SynthesisFailed(String),

    /// Image caption (vision) error
    #[error("caption failed: {0}")]
    CaptionFailed(String),

    /// Session lookup failed
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Chat transport error
    #[error("channel error: {0}")]
    Channel(String),

    /// Attachment processing error
    #[error("attachment error: {0}")]
    Attachment(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Short machine-readable code for client-facing error frames
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::NoActiveRecording => "no_active_recording",
            Self::TranscriptionFailed(_) => "transcription_failed",
            Self::DialogueBackend(_) => "dialogue_backend_error",
            Self::SynthesisFailed(_) => "synthesis_failed",
            Self::CaptionFailed(_) => "caption_failed",
            Self::SessionNotFound(_) => "session_not_found",
            Self::Channel(_) => "channel",
            Self::Attachment(_) => "attachment",
            Self::Io(_) => "io",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_per_failure_class() {
        assert_eq!(Error::NoActiveRecording.code(), "no_active_recording");
        assert_eq!(
            Error::DialogueBackend("status 500".into()).code(),
            "dialogue_backend_error"
        );
        assert_eq!(Error::SessionNotFound("s1".into()).code(), "session_not_found");
        assert_eq!(Error::Attachment("bad".into()).code(), "attachment");
    }

    #[test]
    fn test_io_error_converts() {
        let err: Error = std::io::Error::other("disk full").into();
        assert_eq!(err.code(), "io");
        assert_eq!(err.to_string(), "io error: disk full");
    }
}
