//! Security module for session login

pub mod auth;

pub use auth::{AuthConfig, AuthenticatedUser, UserMetadata};
