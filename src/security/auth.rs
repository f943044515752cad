//! Login check for chat sessions
//!
//! **Placeholder, not production-grade.** Any username containing the
//! configured marker is accepted with any password. No password is verified
//! and no user store is consulted. Replace before exposing the gateway to
//! untrusted networks.

use serde::{Deserialize, Serialize};

/// Default substring a username must contain to be accepted
pub const DEFAULT_USERNAME_MARKER: &str = "voiceflow";

/// Login configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Substring a username must contain
    pub username_marker: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            username_marker: DEFAULT_USERNAME_MARKER.to_string(),
        }
    }
}

impl AuthConfig {
    /// Build from an optional marker override
    #[must_use]
    pub fn from_marker(marker: Option<String>) -> Self {
        marker.map_or_else(Self::default, |username_marker| Self { username_marker })
    }

    /// Check credentials and return the authenticated user
    ///
    /// The password is ignored (see module docs).
    #[must_use]
    pub fn authenticate(&self, username: &str, _password: &str) -> Option<AuthenticatedUser> {
        if !username.contains(self.username_marker.as_str()) {
            tracing::debug!(username, "login rejected");
            return None;
        }

        Some(AuthenticatedUser {
            identifier: username.to_string(),
            metadata: UserMetadata {
                role: "admin".to_string(),
                provider: "credentials".to_string(),
            },
        })
    }
}

/// A user admitted by [`AuthConfig::authenticate`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    /// User identity, also used to key the dialogue backend
    pub identifier: String,

    /// Descriptive metadata
    pub metadata: UserMetadata,
}

/// User metadata attached at login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMetadata {
    pub role: String,
    pub provider: String,
}
