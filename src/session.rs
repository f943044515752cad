//! Per-session state and the registry that owns it
//!
//! Each authenticated connection gets one [`Session`]. Sessions never share
//! mutable state; the registry only maps ids to independently locked records.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};

use crate::security::AuthenticatedUser;
use crate::voice::AudioRecorder;
use crate::{Error, Result};

/// Where a session is within its current turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnState {
    #[default]
    Idle,
    Recording,
    Transcribing,
    CaptioningImage,
    Conversing,
    Synthesizing,
}

impl std::fmt::Display for TurnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Recording => write!(f, "recording"),
            Self::Transcribing => write!(f, "transcribing"),
            Self::CaptioningImage => write!(f, "captioning_image"),
            Self::Conversing => write!(f, "conversing"),
            Self::Synthesizing => write!(f, "synthesizing"),
        }
    }
}

/// One authenticated chat connection
#[derive(Debug)]
pub struct Session {
    /// Session identifier
    pub id: String,

    /// Authenticated user
    pub user: AuthenticatedUser,

    /// Current utterance buffer
    pub recorder: AudioRecorder,

    /// Current turn state
    pub state: TurnState,

    /// When the session was opened
    pub opened_at: Instant,

    /// Whether a chat socket has attached to this session
    pub connected: bool,
}

impl Session {
    /// Create an idle session
    #[must_use]
    pub fn new(id: String, user: AuthenticatedUser) -> Self {
        Self {
            id,
            user,
            recorder: AudioRecorder::new(),
            state: TurnState::Idle,
            opened_at: Instant::now(),
            connected: false,
        }
    }

    /// Record that a chat socket attached
    pub fn mark_connected(&mut self) {
        self.connected = true;
    }

    /// Logged in but never connected for at least `grace`
    #[must_use]
    pub fn is_abandoned(&self, now: Instant, grace: Duration) -> bool {
        !self.connected && now.saturating_duration_since(self.opened_at) >= grace
    }

    /// Move to `next`, logging the transition
    pub fn transition(&mut self, next: TurnState) {
        if self.state != next {
            tracing::debug!(session_id = %self.id, from = %self.state, to = %next, "turn state");
            self.state = next;
        }
    }
}

/// Shared handle to a session record
pub type SharedSession = Arc<Mutex<Session>>;

/// Sessions indexed by id
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SharedSession>>,
}

impl SessionRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session for `user` and return its id
    pub async fn open(&self, user: AuthenticatedUser) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let session = Session::new(id.clone(), user);
        tracing::info!(session_id = %id, user = %session.user.identifier, "session opened");
        self.sessions
            .write()
            .await
            .insert(id.clone(), Arc::new(Mutex::new(session)));
        id
    }

    /// Look up a session
    ///
    /// # Errors
    ///
    /// Returns `SessionNotFound` for unknown ids
    pub async fn get(&self, id: &str) -> Result<SharedSession> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))
    }

    /// Tear down a session; returns whether it existed
    pub async fn close(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            tracing::info!(session_id = %id, "session closed");
        }
        removed
    }

    /// Drop sessions that never connected within `grace`; returns their ids
    ///
    /// Sessions whose lock is held are in use and are kept.
    pub async fn reap_unconnected(&self, grace: Duration) -> Vec<String> {
        let now = Instant::now();
        let mut reaped = Vec::new();

        self.sessions.write().await.retain(|id, session| {
            let abandoned = session
                .try_lock()
                .is_ok_and(|session| session.is_abandoned(now, grace));
            if abandoned {
                reaped.push(id.clone());
            }
            !abandoned
        });

        for id in &reaped {
            tracing::info!(session_id = %id, "reaped session that never connected");
        }
        reaped
    }

    /// Number of open sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether no sessions are open
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::AuthConfig;

    fn user(name: &str) -> AuthenticatedUser {
        AuthConfig::default().authenticate(name, "").unwrap()
    }

    #[tokio::test]
    async fn test_open_get_close() {
        let registry = SessionRegistry::new();
        let id = registry.open(user("a@voiceflow.com")).await;

        let session = registry.get(&id).await.unwrap();
        {
            let session = session.lock().await;
            assert_eq!(session.user.identifier, "a@voiceflow.com");
            assert_eq!(session.state, TurnState::Idle);
            assert!(!session.recorder.is_recording());
        }

        assert!(registry.close(&id).await);
        assert!(!registry.close(&id).await);
        assert!(matches!(registry.get(&id).await, Err(Error::SessionNotFound(_))));
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let registry = SessionRegistry::new();
        let first = registry.open(user("one@voiceflow.com")).await;
        let second = registry.open(user("two@voiceflow.com")).await;
        assert_ne!(first, second);
        assert_eq!(registry.len().await, 2);

        registry
            .get(&first)
            .await
            .unwrap()
            .lock()
            .await
            .recorder
            .start("audio/wav");

        let second = registry.get(&second).await.unwrap();
        assert!(!second.lock().await.recorder.is_recording());
    }

    #[tokio::test]
    async fn test_reap_unconnected() {
        let registry = SessionRegistry::new();
        let idle = registry.open(user("idle@voiceflow.com")).await;
        let live = registry.open(user("live@voiceflow.com")).await;
        registry.get(&live).await.unwrap().lock().await.mark_connected();

        assert!(registry.reap_unconnected(Duration::from_secs(3600)).await.is_empty());
        assert_eq!(registry.len().await, 2);

        assert_eq!(registry.reap_unconnected(Duration::ZERO).await, vec![idle.clone()]);
        assert!(matches!(registry.get(&idle).await, Err(Error::SessionNotFound(_))));
        assert!(registry.get(&live).await.is_ok());
    }

    #[tokio::test]
    async fn test_busy_session_is_not_reaped() {
        let registry = SessionRegistry::new();
        let id = registry.open(user("busy@voiceflow.com")).await;

        let session = registry.get(&id).await.unwrap();
        let _guard = session.lock().await;

        assert!(registry.reap_unconnected(Duration::ZERO).await.is_empty());
        assert_eq!(registry.len().await, 1);
    }
}
