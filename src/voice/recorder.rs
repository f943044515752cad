//! Buffering of streamed audio chunks into one utterance
//!
//! Audio arrives as `start → append* → finalize`. No size cap is enforced:
//! an unbounded utterance grows memory unboundedly.

use crate::{Error, Result};

use super::extension_for_mime;

/// An in-progress utterance: an append-only buffer tagged with its MIME type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioAccumulator {
    mime_type: String,
    data: Vec<u8>,
}

impl AudioAccumulator {
    /// Create an empty buffer for `mime_type`
    #[must_use]
    pub fn new(mime_type: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: Vec::new(),
        }
    }

    /// MIME type of the stream
    #[must_use]
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Bytes collected so far
    #[must_use]
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether nothing has been appended yet
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A finished utterance handed to transcription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recording {
    /// MIME type of the audio
    pub mime_type: String,

    /// Raw audio bytes in arrival order
    pub data: Vec<u8>,
}

impl Recording {
    /// File name conveying the container to the transcription provider
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("input_audio.{}", extension_for_mime(&self.mime_type))
    }
}

/// Per-session slot holding at most one live [`AudioAccumulator`]
#[derive(Debug, Default)]
pub struct AudioRecorder {
    current: Option<AudioAccumulator>,
}

impl AudioRecorder {
    /// Create an idle recorder
    #[must_use]
    pub const fn new() -> Self {
        Self { current: None }
    }

    /// Begin a new utterance, discarding any unfinished one
    pub fn start(&mut self, mime_type: &str) {
        if let Some(previous) = self.current.replace(AudioAccumulator::new(mime_type)) {
            tracing::debug!(
                discarded_bytes = previous.len(),
                "new recording replaced unfinished one"
            );
        }
    }

    /// Append a chunk to the current utterance
    ///
    /// # Errors
    ///
    /// Returns `NoActiveRecording` if `start` was not called
    pub fn append(&mut self, chunk: &[u8]) -> Result<()> {
        let current = self.current.as_mut().ok_or(Error::NoActiveRecording)?;
        current.data.extend_from_slice(chunk);
        Ok(())
    }

    /// Take the finished utterance and clear the slot
    ///
    /// # Errors
    ///
    /// Returns `NoActiveRecording` if there is nothing to finalize
    pub fn finalize(&mut self) -> Result<Recording> {
        let AudioAccumulator { mime_type, data } =
            self.current.take().ok_or(Error::NoActiveRecording)?;
        Ok(Recording { mime_type, data })
    }

    /// The utterance in progress, if any
    #[must_use]
    pub const fn current(&self) -> Option<&AudioAccumulator> {
        self.current.as_ref()
    }

    /// Whether an utterance is being recorded
    #[must_use]
    pub const fn is_recording(&self) -> bool {
        self.current.is_some()
    }
}
