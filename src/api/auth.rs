//! Login endpoint
//!
//! Uses the placeholder check in [`crate::security::auth`]; not production-grade.

use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::post};
use serde::{Deserialize, Serialize};

use super::{ApiError, ApiState};
use crate::security::AuthenticatedUser;

/// Build auth router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/login", post(login))
        .with_state(state)
}

/// Login request body
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub session_id: String,
    pub user: AuthenticatedUser,
}

/// Check credentials and open a chat session
async fn login(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let user = state
        .auth
        .authenticate(&request.username, &request.password)
        .ok_or(ApiError::Unauthorized("invalid credentials"))?;

    let session_id = state.sessions.open(user.clone()).await;

    Ok(Json(LoginResponse { session_id, user }))
}
