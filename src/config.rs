//! Configuration management for Parley gateway
//!
//! Everything is read once at process start. A `.env` file in the working
//! directory is loaded first (see `main.rs`), then the process environment.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::security::AuthConfig;
use crate::{Error, Result};

/// Environment variables that must be present for the gateway to start
pub const REQUIRED_VARS: &[&str] = &[
    "OPENAI_API_KEY",
    "ELEVENLABS_API_KEY",
    "ELEVENLABS_VOICE_ID",
    "VOICEFLOW_API_KEY",
];

/// Parley gateway configuration
#[derive(Debug)]
pub struct Config {
    /// API keys for external services
    pub api_keys: ApiKeys,

    /// Speech-to-text and text-to-speech configuration
    pub voice: VoiceConfig,

    /// Conversational backend configuration
    pub dialogue: DialogueConfig,

    /// Image captioning configuration
    pub vision: VisionConfig,

    /// HTTP server configuration
    pub server: ServerConfig,

    /// Login configuration
    pub auth: AuthConfig,
}

/// API keys for external services
#[derive(Debug)]
pub struct ApiKeys {
    /// `OpenAI` API key (Whisper transcription and vision captioning)
    pub openai: SecretString,

    /// `ElevenLabs` API key (speech synthesis)
    pub elevenlabs: SecretString,

    /// Voiceflow runtime API key (dialogue backend)
    pub voiceflow: SecretString,
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Base URL of the transcription provider
    pub stt_base_url: String,

    /// Transcription model identifier
    pub stt_model: String,

    /// Base URL of the synthesis provider
    pub tts_base_url: String,

    /// Synthesis model identifier
    pub tts_model: String,

    /// `ElevenLabs` voice identifier
    pub voice_id: String,

    /// Voice stability (0.0 to 1.0)
    pub stability: f32,

    /// Voice similarity boost (0.0 to 1.0)
    pub similarity_boost: f32,

    /// Upper bound on a synthesis request
    pub synthesis_timeout: Duration,
}

/// Conversational backend configuration
#[derive(Debug, Clone)]
pub struct DialogueConfig {
    /// Voiceflow runtime base URL
    pub base_url: String,

    /// Version tag sent with every interaction
    pub version_id: String,
}

/// Image captioning configuration
#[derive(Debug, Clone)]
pub struct VisionConfig {
    /// Base URL of the chat completions provider
    pub base_url: String,

    /// Vision-capable model identifier
    pub model: String,

    /// Max tokens for the caption
    pub max_tokens: u32,
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,

    /// Public URL of this server (`SERVER_URL`), informational
    pub public_url: Option<String>,

    /// Directory for uploaded message attachments
    pub upload_dir: PathBuf,

    /// Path to static files directory (web UI)
    pub static_dir: Option<PathBuf>,

    /// How long a login may go without opening a chat socket
    pub session_grace: Duration,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            stt_base_url: "https://api.openai.com".to_string(),
            stt_model: "whisper-1".to_string(),
            tts_base_url: "https://api.elevenlabs.io".to_string(),
            tts_model: "eleven_multilingual_v2".to_string(),
            voice_id: String::new(),
            stability: 0.5,
            similarity_boost: 0.5,
            synthesis_timeout: Duration::from_secs(25),
        }
    }
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            base_url: "https://general-runtime.voiceflow.com".to_string(),
            version_id: "development".to_string(),
        }
    }
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            model: "gpt-4o".to_string(),
            max_tokens: 300,
        }
    }
}

/// Default upload directory (`~/.local/share/omni/parley/uploads` on Linux)
#[must_use]
pub fn default_upload_dir() -> PathBuf {
    directories::ProjectDirs::from("dev", "omni", "omni").map_or_else(
        || PathBuf::from(".parley/uploads"),
        |d| d.data_dir().join("parley").join("uploads"),
    )
}

impl Config {
    /// Load configuration from the process environment
    ///
    /// # Errors
    ///
    /// Returns error if a mandatory key is missing or a value cannot be parsed
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    ///
    /// # Errors
    ///
    /// Returns error if a mandatory key is missing or a value cannot be parsed
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let missing: Vec<&str> = REQUIRED_VARS
            .iter()
            .copied()
            .filter(|key| get(*key).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(Error::Config(format!(
                "{} must be set",
                missing.join(", ")
            )));
        }

        let required = |key: &str| get(key).unwrap_or_default();

        let api_keys = ApiKeys {
            openai: SecretString::from(required("OPENAI_API_KEY")),
            elevenlabs: SecretString::from(required("ELEVENLABS_API_KEY")),
            voiceflow: SecretString::from(required("VOICEFLOW_API_KEY")),
        };

        let voice_defaults = VoiceConfig::default();
        let voice = VoiceConfig {
            stt_base_url: get("PARLEY_STT_BASE_URL").unwrap_or(voice_defaults.stt_base_url),
            stt_model: get("PARLEY_STT_MODEL").unwrap_or(voice_defaults.stt_model),
            tts_base_url: get("PARLEY_TTS_BASE_URL").unwrap_or(voice_defaults.tts_base_url),
            tts_model: get("PARLEY_TTS_MODEL").unwrap_or(voice_defaults.tts_model),
            voice_id: required("ELEVENLABS_VOICE_ID"),
            stability: parse_or(
                get("PARLEY_TTS_STABILITY"),
                "PARLEY_TTS_STABILITY",
                voice_defaults.stability,
            )?
            .clamp(0.0, 1.0),
            similarity_boost: parse_or(
                get("PARLEY_TTS_SIMILARITY_BOOST"),
                "PARLEY_TTS_SIMILARITY_BOOST",
                voice_defaults.similarity_boost,
            )?
            .clamp(0.0, 1.0),
            synthesis_timeout: Duration::from_secs(parse_or(
                get("PARLEY_TTS_TIMEOUT_SECS"),
                "PARLEY_TTS_TIMEOUT_SECS",
                voice_defaults.synthesis_timeout.as_secs(),
            )?),
        };

        let dialogue_defaults = DialogueConfig::default();
        let dialogue = DialogueConfig {
            base_url: get("VOICEFLOW_RUNTIME_URL").unwrap_or(dialogue_defaults.base_url),
            version_id: get("VOICEFLOW_VERSION_ID").unwrap_or(dialogue_defaults.version_id),
        };

        let vision_defaults = VisionConfig::default();
        let vision = VisionConfig {
            base_url: get("PARLEY_VISION_BASE_URL").unwrap_or(vision_defaults.base_url),
            model: get("PARLEY_VISION_MODEL").unwrap_or(vision_defaults.model),
            max_tokens: parse_or(
                get("PARLEY_VISION_MAX_TOKENS"),
                "PARLEY_VISION_MAX_TOKENS",
                vision_defaults.max_tokens,
            )?,
        };

        let server = ServerConfig {
            port: parse_or(get("PARLEY_PORT").or_else(|| get("PORT")), "PARLEY_PORT", 8000)?,
            public_url: get("SERVER_URL"),
            upload_dir: get("PARLEY_UPLOAD_DIR").map_or_else(default_upload_dir, PathBuf::from),
            static_dir: get("PARLEY_STATIC_DIR").map(PathBuf::from),
            session_grace: Duration::from_secs(parse_or(
                get("PARLEY_SESSION_GRACE_SECS"),
                "PARLEY_SESSION_GRACE_SECS",
                300,
            )?),
        };

        let auth = AuthConfig::from_marker(get("PARLEY_AUTH_USERNAME_MARKER"));

        Ok(Self {
            api_keys,
            voice,
            dialogue,
            vision,
            server,
            auth,
        })
    }
}

/// Parse an optional variable, falling back to `default` when unset
fn parse_or<T: std::str::FromStr>(value: Option<String>, key: &str, default: T) -> Result<T> {
    value.map_or(Ok(default), |v| {
        v.trim()
            .parse()
            .map_err(|_| Error::Config(format!("invalid value for {key}: {v}")))
    })
}
