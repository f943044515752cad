//! HTTP API server for Parley gateway

pub mod auth;
pub mod files;
pub mod health;
pub mod websocket;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::orchestrator::TurnOrchestrator;
use crate::security::AuthConfig;
use crate::session::SessionRegistry;
use crate::{Error, Result};

pub use files::UploadStore;

/// Shared state for API handlers
pub struct ApiState {
    pub orchestrator: Arc<TurnOrchestrator>,
    pub sessions: Arc<SessionRegistry>,
    pub auth: AuthConfig,
    pub uploads: UploadStore,
}

impl ApiState {
    /// Build state around an orchestrator, sharing its session registry
    #[must_use]
    pub fn new(
        orchestrator: Arc<TurnOrchestrator>,
        auth: AuthConfig,
        upload_dir: PathBuf,
    ) -> Self {
        Self {
            sessions: orchestrator.sessions().clone(),
            orchestrator,
            auth,
            uploads: UploadStore::new(upload_dir),
        }
    }

    /// Release everything a session uploaded, then close it
    pub async fn end_session(&self, session_id: &str) {
        self.uploads.release_session(session_id).await;
        self.sessions.close(session_id).await;
    }

    /// Drop sessions that logged in but never connected within `grace`
    ///
    /// Returns the number of sessions removed.
    pub async fn reap_abandoned_sessions(&self, grace: Duration) -> usize {
        let reaped = self.sessions.reap_unconnected(grace).await;
        for id in &reaped {
            self.uploads.release_session(id).await;
        }
        reaped.len()
    }
}

/// Default time a login may go without opening a chat socket
pub const DEFAULT_SESSION_GRACE: Duration = Duration::from_secs(300);

/// Periodically reap abandoned sessions
pub fn spawn_session_reaper(
    state: Arc<ApiState>,
    grace: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(grace.max(Duration::from_secs(1)));
        // Skip the first immediate tick
        interval.tick().await;

        loop {
            interval.tick().await;
            let reaped = state.reap_abandoned_sessions(grace).await;
            if reaped > 0 {
                tracing::debug!(reaped, "session sweep");
            }
        }
    })
}

/// Build the router with all routes
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .nest("/api/auth", auth::router(state.clone()))
        .nest("/api/files", files::router(state.clone()))
        .nest("/ws", websocket::router(state.clone()))
        .merge(health::router())
        .merge(health::ready_router(state))
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
    static_dir: Option<PathBuf>,
    session_grace: Duration,
}

impl ApiServer {
    /// Create a server for `state` on `port`
    #[must_use]
    pub const fn new(state: Arc<ApiState>, port: u16) -> Self {
        Self {
            state,
            port,
            static_dir: None,
            session_grace: DEFAULT_SESSION_GRACE,
        }
    }

    /// Set the static files directory for serving the web UI
    #[must_use]
    pub fn static_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.static_dir = dir;
        self
    }

    /// Set how long a login may go without connecting before it is reaped
    #[must_use]
    pub const fn session_grace(mut self, grace: Duration) -> Self {
        self.session_grace = grace;
        self
    }

    fn app(&self) -> Router {
        let mut router = router(self.state.clone());

        // Serve static files if configured
        if let Some(static_dir) = &self.static_dir {
            let index_file = static_dir.join("index.html");
            let serve_dir =
                ServeDir::new(static_dir).not_found_service(ServeFile::new(&index_file));

            router = router.fallback_service(serve_dir);
            tracing::info!(path = %static_dir.display(), "serving static files");
        }

        // CORS layer for cross-origin requests from frontend
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        router.layer(cors).layer(TraceLayer::new_for_http())
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(port = self.port, "API server listening");

        let reaper = spawn_session_reaper(self.state.clone(), self.session_grace);

        let served = axum::serve(listener, self.app())
            .await
            .map_err(|e| Error::Config(format!("API server error: {e}")));
        reaper.abort();

        served
    }
}

/// API errors rendered as `{error: {code, message}}`
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(&'static str),
    NotFound(String),
    Internal(String),
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        match e {
            Error::SessionNotFound(id) => Self::NotFound(format!("session not found: {id}")),
            Error::NoActiveRecording | Error::Attachment(_) => Self::BadRequest(e.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: ErrorBody,
        }

        #[derive(Serialize)]
        struct ErrorBody {
            code: &'static str,
            message: String,
        }

        let (status, code, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg.to_string()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal", msg)
            }
        };

        let body = ErrorResponse {
            error: ErrorBody { code, message },
        };
        (status, Json(body)).into_response()
    }
}
