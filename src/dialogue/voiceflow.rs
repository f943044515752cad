//! Voiceflow runtime client

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::config::DialogueConfig;
use crate::{Error, Result};

use super::{Dialogue, DialogueRequest, Trace, TraceRendering, normalize_user_id};

/// Client for the Voiceflow state/interact API
pub struct VoiceflowClient {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    version_id: String,
    rendering: TraceRendering,
}

#[derive(serde::Serialize)]
struct InteractBody<'a> {
    request: &'a DialogueRequest,
}

impl VoiceflowClient {
    /// Create a new Voiceflow client
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(api_key: SecretString, config: &DialogueConfig) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config("Voiceflow API key required".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: config.base_url.clone(),
            version_id: config.version_id.clone(),
            rendering: TraceRendering::default(),
        })
    }

    /// Interact endpoint for a user
    fn interact_url(&self, user_id: &str) -> String {
        format!(
            "{}/state/user/{}/interact",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(&normalize_user_id(user_id))
        )
    }
}

#[async_trait]
impl Dialogue for VoiceflowClient {
    async fn interact(&self, user_id: &str, request: &DialogueRequest) -> Result<String> {
        let url = self.interact_url(user_id);
        tracing::debug!(url = %url, ?request, "sending dialogue request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.api_key.expose_secret())
            .header("versionID", &self.version_id)
            .json(&InteractBody { request })
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Voiceflow request failed");
                Error::DialogueBackend(format!("request failed: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Voiceflow API error");
            return Err(Error::DialogueBackend(format!(
                "Voiceflow API error {status}: {body}"
            )));
        }

        let traces: Vec<Trace> = response
            .json()
            .await
            .map_err(|e| Error::DialogueBackend(format!("invalid trace list: {e}")))?;

        for trace in &traces {
            tracing::trace!(kind = %trace.kind, payload = %trace.payload, "trace");
        }

        let reply = self.rendering.render(&traces);
        tracing::info!(traces = traces.len(), reply_chars = reply.len(), "dialogue turn complete");
        Ok(reply)
    }
}
