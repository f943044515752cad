//! Attachment handling for multimodal messages
//!
//! Classifies attachments by MIME type and captions images so they can be
//! fed to the dialogue backend as text.

mod vision;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use vision::{FOOD_INSTRUCTION, ImageCaptioner, VisionClient};

/// Recognized content categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentCategory {
    /// Image file (JPEG, PNG, GIF, etc.)
    Image,
    /// Audio file (MP3, WAV, WebM, etc.)
    Audio,
    /// Video file (MP4, MOV, etc.)
    Video,
    /// Anything else
    File,
}

impl ContentCategory {
    /// Determine category from a declared MIME type
    #[must_use]
    pub fn from_mime(mime_type: &str) -> Self {
        let lower = mime_type.trim().to_lowercase();
        let top_level = lower.split('/').next().unwrap_or_default();
        match top_level {
            "image" => Self::Image,
            "audio" => Self::Audio,
            "video" => Self::Video,
            _ => Self::File,
        }
    }
}

/// A file attached to a chat message, already stored on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Display name
    pub name: String,

    /// Declared MIME type
    #[serde(rename = "mime")]
    pub mime_type: String,

    /// Local path of the stored file
    pub path: PathBuf,
}

impl Attachment {
    /// Category of this attachment
    #[must_use]
    pub fn category(&self) -> ContentCategory {
        ContentCategory::from_mime(&self.mime_type)
    }
}

/// First attachment classified as an image
#[must_use]
pub fn first_image(attachments: &[Attachment]) -> Option<&Attachment> {
    attachments
        .iter()
        .find(|a| a.category() == ContentCategory::Image)
}
