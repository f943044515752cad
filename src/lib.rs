//! Parley Gateway - Voice and text chat front end for a hosted dialogue agent
//!
//! This library provides the core functionality for the Parley gateway:
//! - Audio accumulation for streamed utterances
//! - Speech-to-text, text-to-speech and image captioning clients
//! - Dialogue backend client
//! - Per-session turn orchestration
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    Chat UI                          │
//! │        audio chunks  │  messages  │  uploads        │
//! └────────────────────┬────────────────────────────────┘
//!                      │  WebSocket / HTTP
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Parley Gateway                      │
//! │   Sessions  │  Recorder  │  Turn Orchestrator       │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Providers                           │
//! │   Whisper  │  Voiceflow  │  ElevenLabs  │  Vision   │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod attachments;
pub mod chat;
pub mod config;
pub mod dialogue;
pub mod error;
pub mod orchestrator;
pub mod security;
pub mod session;
pub mod voice;

pub use chat::{ChatMessage, ChatSink, Element};
pub use config::Config;
pub use error::{Error, Result};
pub use orchestrator::{Services, TurnOrchestrator};
pub use session::{SessionRegistry, TurnState};
