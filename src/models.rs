use serde::{Serialize, Deserialize};
use chrono::{DateTime, Utc};

use crate::codec::{self, EncodedImage, FileHandle};
use crate::error::{Error, Result};

/// An image the user selected, already encoded for preview and transport.
/// Never mutated; a new selection replaces it.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    raw_file: FileHandle,
    encoded_preview: EncodedImage,
    mime_type: String,
}

impl UploadedImage {
    pub(crate) fn new(raw_file: FileHandle, encoded_preview: EncodedImage, mime_type: String) -> Self {
        Self { raw_file, encoded_preview, mime_type }
    }

    pub fn raw_file(&self) -> &FileHandle { &self.raw_file }

    pub fn encoded_preview(&self) -> &EncodedImage { &self.encoded_preview }

    pub fn mime_type(&self) -> &str { &self.mime_type }
}

/// One edit submission. Only exists when both an image and a non-blank prompt do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditRequest {
    prompt_text: String,
    image_base64: String,
    mime_type: String,
}

impl EditRequest {
    pub fn new(image: Option<&UploadedImage>, prompt: &str) -> Result<Self> {
        let prompt_text = prompt.trim();
        let image = match image {
            Some(image) if !prompt_text.is_empty() => image,
            _ => return Err(Error::Validation),
        };
        let payload = codec::extract_payload(image.encoded_preview());
        Ok(Self {
            prompt_text: prompt_text.to_string(),
            image_base64: payload.base64,
            mime_type: image.mime_type().to_string(),
        })
    }

    pub fn prompt_text(&self) -> &str { &self.prompt_text }

    pub fn image_base64(&self) -> &str { &self.image_base64 }

    pub fn mime_type(&self) -> &str { &self.mime_type }
}

/// Outcome of the current (or last) edit attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum EditResult {
    #[default]
    Idle,
    Loading,
    Success(String), // data URI of the edited image
    Failure(String),
}

impl EditResult {
    pub fn is_loading(&self) -> bool { matches!(self, EditResult::Loading) }
}

/// Read-only view of a session for rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub has_image: bool,
    pub preview: Option<String>,
    pub prompt: String,
    pub result: EditResult,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptUpdate {
    pub prompt: String,
}
