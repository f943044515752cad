//! Text-to-speech (TTS) processing

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use secrecy::{ExposeSecret, SecretString};

use crate::config::VoiceConfig;
use crate::{Error, Result};

use super::extension_for_mime;

/// Synthesized speech, named after its container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechAudio {
    /// File name, e.g. `output_audio.wav`
    pub name: String,

    /// MIME type of the audio
    pub mime_type: String,

    /// Raw audio bytes
    pub data: Vec<u8>,
}

impl SpeechAudio {
    /// Wrap audio bytes, deriving the file name from `mime_type`
    #[must_use]
    pub fn new(mime_type: &str, data: Vec<u8>) -> Self {
        Self {
            name: format!("output_audio.{}", extension_for_mime(mime_type)),
            mime_type: mime_type.to_string(),
            data,
        }
    }
}

/// Turns reply text into playable audio
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize `text` as audio of `mime_type`
    ///
    /// # Errors
    ///
    /// Returns `SynthesisFailed` on non-success status or timeout
    async fn synthesize(&self, text: &str, mime_type: &str) -> Result<SpeechAudio>;
}

/// Synthesizes speech from text using `ElevenLabs`
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: SecretString,
    voice_id: String,
    model: String,
    stability: f32,
    similarity_boost: f32,
    timeout: Duration,
    base_url: String,
}

impl TextToSpeech {
    /// Create a new TTS instance from voice configuration
    ///
    /// # Errors
    ///
    /// Returns error if API key or voice ID is missing, or the HTTP client
    /// cannot be built
    pub fn new(api_key: SecretString, config: &VoiceConfig) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config(
                "ElevenLabs API key required for TTS".to_string(),
            ));
        }
        if config.voice_id.is_empty() {
            return Err(Error::Config(
                "ElevenLabs voice ID required for TTS".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(config.synthesis_timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            voice_id: config.voice_id.clone(),
            model: config.tts_model.clone(),
            stability: config.stability,
            similarity_boost: config.similarity_boost,
            timeout: config.synthesis_timeout,
            base_url: config.tts_base_url.clone(),
        })
    }
}

#[async_trait]
impl Synthesizer for TextToSpeech {
    async fn synthesize(&self, text: &str, mime_type: &str) -> Result<SpeechAudio> {
        #[derive(serde::Serialize)]
        struct VoiceSettings {
            stability: f32,
            similarity_boost: f32,
        }

        #[derive(serde::Serialize)]
        struct ElevenLabsRequest<'a> {
            text: &'a str,
            model_id: &'a str,
            voice_settings: VoiceSettings,
        }

        let url = format!(
            "{}/v1/text-to-speech/{}",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(&self.voice_id)
        );

        let request = ElevenLabsRequest {
            text,
            model_id: &self.model,
            voice_settings: VoiceSettings {
                stability: self.stability,
                similarity_boost: self.similarity_boost,
            },
        };

        tracing::debug!(chars = text.len(), mime_type, "starting ElevenLabs synthesis");

        let timeout = self.timeout;
        let failed = move |e: &reqwest::Error| {
            if e.is_timeout() {
                Error::SynthesisFailed(format!("timed out after {timeout:?}"))
            } else {
                Error::SynthesisFailed(format!("request failed: {e}"))
            }
        };

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", self.api_key.expose_secret())
            .header("Accept", mime_type)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "ElevenLabs request failed");
                failed(&e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "ElevenLabs API error");
            return Err(Error::SynthesisFailed(format!(
                "ElevenLabs TTS error {status}: {body}"
            )));
        }

        let mut data = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                tracing::error!(error = %e, "ElevenLabs stream interrupted");
                failed(&e)
            })?;
            data.extend_from_slice(&chunk);
        }

        tracing::info!(audio_bytes = data.len(), "synthesis complete");
        Ok(SpeechAudio::new(mime_type, data))
    }
}
