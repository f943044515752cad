//! Voice processing module
//!
//! Buffers streamed utterances, transcribes them with Whisper, and
//! synthesizes replies with `ElevenLabs`.

mod recorder;
mod stt;
mod tts;

pub use recorder::{AudioAccumulator, AudioRecorder, Recording};
pub use stt::{SpeechToText, Transcriber};
pub use tts::{SpeechAudio, Synthesizer, TextToSpeech};

/// File extension for an audio MIME type, taken from its subtype
///
/// Parameters are dropped: `audio/webm;codecs=opus` yields `webm`.
/// Types without a subtype fall back to `bin`.
#[must_use]
pub fn extension_for_mime(mime_type: &str) -> &str {
    mime_type
        .split_once('/')
        .map(|(_, subtype)| subtype.split(';').next().unwrap_or_default().trim())
        .filter(|ext| !ext.is_empty())
        .unwrap_or("bin")
}
