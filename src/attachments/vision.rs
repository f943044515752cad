//! Vision API client for image captioning
//!
//! Uses `OpenAI` chat completions with an inline base64 image

use std::path::Path;

use async_trait::async_trait;
use base64::Engine;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::config::VisionConfig;
use crate::{Error, Result};

/// Instruction sent alongside every image
pub const FOOD_INSTRUCTION: &str = "You are a food assistant. Please help me identify the food in the image. If there are multiple foods, please list them all. If there are dividers, please list them as well. If it is a plate that has leftovers, please list the leftovers.";

/// Produces a text description of an image file
#[async_trait]
pub trait ImageCaptioner: Send + Sync {
    /// Caption the image stored at `path`
    ///
    /// # Errors
    ///
    /// Returns `CaptionFailed` if the file cannot be read or the API call fails
    async fn caption(&self, path: &Path) -> Result<String>;
}

/// Vision client for image captioning
pub struct VisionClient {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    max_tokens: u32,
    base_url: String,
}

/// Chat completion request
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    max_tokens: u32,
}

/// A message in the request
#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: Vec<ContentPart<'a>>,
}

/// Content part (text or image)
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl VisionClient {
    /// Create a new vision client
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(api_key: SecretString, config: &VisionConfig) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config(
                "OpenAI API key required for vision".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            base_url: config.base_url.clone(),
        })
    }

    /// Caption raw image bytes
    ///
    /// # Errors
    ///
    /// Returns error if API call fails or the response has no content
    pub async fn describe_image(&self, image_data: &[u8], media_type: &str) -> Result<String> {
        let base64_data = base64::engine::general_purpose::STANDARD.encode(image_data);

        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![Message {
                role: "user",
                content: vec![
                    ContentPart::Text {
                        text: FOOD_INSTRUCTION,
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: format!("data:{media_type};base64,{base64_data}"),
                        },
                    },
                ],
            }],
            max_tokens: self.max_tokens,
        };

        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::CaptionFailed(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::CaptionFailed(format!("API error {status}: {body}")));
        }

        let result: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::CaptionFailed(format!("parse error: {e}")))?;

        let caption = result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::CaptionFailed("empty response from vision API".to_string()))?;

        tracing::debug!(caption = %caption, "image captioned");
        Ok(caption)
    }
}

#[async_trait]
impl ImageCaptioner for VisionClient {
    async fn caption(&self, path: &Path) -> Result<String> {
        let image_data = tokio::fs::read(path).await.map_err(|e| {
            Error::CaptionFailed(format!("failed to read {}: {e}", path.display()))
        })?;

        tracing::debug!(path = %path.display(), bytes = image_data.len(), "captioning image");
        self.describe_image(&image_data, media_type_for_path(path)).await
    }
}

/// Media type for the data URL, from the file extension
fn media_type_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        // jpeg, jpg, and any unknown type default to jpeg
        _ => "image/jpeg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_type_for_path() {
        assert_eq!(media_type_for_path(Path::new("a.PNG")), "image/png");
        assert_eq!(media_type_for_path(Path::new("a.webp")), "image/webp");
        assert_eq!(media_type_for_path(Path::new("a.jpg")), "image/jpeg");
        assert_eq!(media_type_for_path(Path::new("upload")), "image/jpeg");
    }

    #[test]
    fn test_request_shape() {
        let request = ChatCompletionRequest {
            model: "gpt-4o",
            messages: vec![Message {
                role: "user",
                content: vec![
                    ContentPart::Text { text: "hi" },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: "data:image/jpeg;base64,AAAA".to_string(),
                        },
                    },
                ],
            }],
            max_tokens: 300,
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "gpt-4o");
        assert_eq!(value["max_tokens"], 300);
        assert_eq!(value["messages"][0]["content"][0]["type"], "text");
        assert_eq!(value["messages"][0]["content"][1]["type"], "image_url");
        assert_eq!(
            value["messages"][0]["content"][1]["image_url"]["url"],
            "data:image/jpeg;base64,AAAA"
        );
    }

    #[tokio::test]
    async fn test_missing_file_fails() {
        let client = VisionClient::new(
            SecretString::from("sk-test".to_string()),
            &VisionConfig::default(),
        )
        .unwrap();

        let err = client
            .caption(Path::new("/nonexistent/parley/meal.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CaptionFailed(_)));
    }
}
