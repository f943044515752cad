//! Shared test utilities
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use parley_gateway::attachments::ImageCaptioner;
use parley_gateway::chat::{ChatMessage, ChatSink, Step, StepStatus};
use parley_gateway::dialogue::{Dialogue, DialogueRequest};
use parley_gateway::security::AuthConfig;
use parley_gateway::voice::{SpeechAudio, Synthesizer, Transcriber};
use parley_gateway::{Error, Result, Services, SessionRegistry, TurnOrchestrator};
use tokio::net::TcpListener;

/// Transcriber returning a fixed transcript
#[derive(Default)]
pub struct MockTranscriber {
    pub transcript: String,
    pub fail: bool,
    pub calls: Mutex<Vec<(Vec<u8>, String, String)>>,
}

impl MockTranscriber {
    pub fn saying(transcript: &str) -> Self {
        Self {
            transcript: transcript.to_string(),
            ..Self::default()
        }
    }
}

#[async_trait]
impl Transcriber for MockTranscriber {
    async fn transcribe(&self, audio: &[u8], file_name: &str, mime_type: &str) -> Result<String> {
        self.calls.lock().unwrap().push((
            audio.to_vec(),
            file_name.to_string(),
            mime_type.to_string(),
        ));
        if self.fail {
            return Err(Error::TranscriptionFailed("status 401".to_string()));
        }
        Ok(self.transcript.clone())
    }
}

/// Dialogue backend answering `Welcome!` to launch and echoing text
#[derive(Default)]
pub struct MockDialogue {
    pub fail: bool,
    pub requests: Mutex<Vec<(String, DialogueRequest)>>,
}

#[async_trait]
impl Dialogue for MockDialogue {
    async fn interact(&self, user_id: &str, request: &DialogueRequest) -> Result<String> {
        self.requests
            .lock()
            .unwrap()
            .push((user_id.to_string(), request.clone()));
        if self.fail {
            return Err(Error::DialogueBackend("status 500".to_string()));
        }
        Ok(match request {
            DialogueRequest::Launch => "Welcome!".to_string(),
            DialogueRequest::Text { payload } => format!("echo: {payload}"),
        })
    }
}

/// Synthesizer returning the reply text as audio bytes
#[derive(Default)]
pub struct MockSynthesizer {
    pub fail: bool,
    pub calls: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Synthesizer for MockSynthesizer {
    async fn synthesize(&self, text: &str, mime_type: &str) -> Result<SpeechAudio> {
        self.calls
            .lock()
            .unwrap()
            .push((text.to_string(), mime_type.to_string()));
        if self.fail {
            return Err(Error::SynthesisFailed("timed out after 25s".to_string()));
        }
        Ok(SpeechAudio::new(mime_type, text.as_bytes().to_vec()))
    }
}

/// Captioner returning a fixed caption
#[derive(Default)]
pub struct MockCaptioner {
    pub caption: String,
    pub fail: bool,
    pub calls: Mutex<Vec<PathBuf>>,
}

impl MockCaptioner {
    pub fn seeing(caption: &str) -> Self {
        Self {
            caption: caption.to_string(),
            ..Self::default()
        }
    }
}

#[async_trait]
impl ImageCaptioner for MockCaptioner {
    async fn caption(&self, path: &Path) -> Result<String> {
        self.calls.lock().unwrap().push(path.to_path_buf());
        if self.fail {
            return Err(Error::CaptionFailed("empty response from vision API".to_string()));
        }
        Ok(self.caption.clone())
    }
}

/// Mocks wired into one orchestrator
pub struct Harness {
    pub transcriber: Arc<MockTranscriber>,
    pub dialogue: Arc<MockDialogue>,
    pub synthesizer: Arc<MockSynthesizer>,
    pub captioner: Arc<MockCaptioner>,
    pub orchestrator: Arc<TurnOrchestrator>,
}

impl Harness {
    pub fn new(dialogue: MockDialogue, synthesizer: MockSynthesizer) -> Self {
        Self::with_services(
            MockTranscriber::saying("hello"),
            dialogue,
            synthesizer,
            MockCaptioner::seeing("a plate of pasta"),
        )
    }

    pub fn with_services(
        transcriber: MockTranscriber,
        dialogue: MockDialogue,
        synthesizer: MockSynthesizer,
        captioner: MockCaptioner,
    ) -> Self {
        let transcriber = Arc::new(transcriber);
        let dialogue = Arc::new(dialogue);
        let synthesizer = Arc::new(synthesizer);
        let captioner = Arc::new(captioner);

        let services = Services {
            transcriber: transcriber.clone(),
            dialogue: dialogue.clone(),
            synthesizer: synthesizer.clone(),
            captioner: captioner.clone(),
        };
        let orchestrator = Arc::new(TurnOrchestrator::new(
            services,
            Arc::new(SessionRegistry::new()),
        ));

        Self {
            transcriber,
            dialogue,
            synthesizer,
            captioner,
            orchestrator,
        }
    }

    /// Open a session for a user accepted by the default login check
    pub async fn open_session(&self, username: &str) -> String {
        let user = AuthConfig::default()
            .authenticate(username, "")
            .expect("test user must pass the login check");
        self.orchestrator.sessions().open(user).await
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new(MockDialogue::default(), MockSynthesizer::default())
    }
}

/// Sink that keeps everything posted to it
#[derive(Default)]
pub struct RecordingSink {
    pub messages: Mutex<Vec<ChatMessage>>,
    pub steps: Mutex<Vec<(Step, StepStatus)>>,
}

impl RecordingSink {
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.messages.lock().unwrap().clone()
    }

    pub fn steps(&self) -> Vec<(Step, StepStatus)> {
        self.steps.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatSink for RecordingSink {
    async fn post(&self, message: ChatMessage) -> Result<()> {
        self.messages.lock().unwrap().push(message);
        Ok(())
    }

    async fn step(&self, step: Step, status: StepStatus) {
        self.steps.lock().unwrap().push((step, status));
    }
}

/// Serve `router` on an ephemeral local port and return its base URL
pub async fn spawn_server(router: axum::Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind test server");
    let addr = listener.local_addr().expect("no local address");

    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("test server failed");
    });

    format!("http://{addr}")
}
