use async_trait::async_trait;
use serde_json::json;
use serde::Deserialize;
use reqwest::Client;
use tracing::{debug, info, error, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::EditRequest;

/// The API key travels in this header so it never appears in a URL or an error message.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Anything that can turn an [`EditRequest`] into the base64 payload of an edited image.
#[async_trait]
pub trait ImageEditor: Send + Sync {
    async fn submit(&self, request: &EditRequest) -> Result<String>;
}

/// Internal failure causes. These are logged, then collapsed into [`Error::RequestFailed`].
#[derive(Debug, thiserror::Error)]
enum GeminiError {
    // Always built from `reqwest::Error::without_url`.
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    #[error("status={status} body={body}")]
    Status { status: reqwest::StatusCode, body: String },
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

// Truncates base64 payloads inside a JSON document so bodies can be logged.
fn truncate_base64_in_json(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                if key == "data" {
                    if let serde_json::Value::String(s) = val {
                        if s.len() > 100 && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '=') {
                            *val = serde_json::Value::String(format!("{}...[truncated {} chars]", &s[..50], s.len() - 50));
                        }
                    }
                } else {
                    truncate_base64_in_json(val);
                }
            }
        }
        serde_json::Value::Array(arr) => {
            for val in arr.iter_mut() {
                truncate_base64_in_json(val);
            }
        }
        _ => {}
    }
}

fn loggable(value: &serde_json::Value) -> String {
    let mut value = value.clone();
    truncate_base64_in_json(&mut value);
    serde_json::to_string(&value).unwrap_or_default()
}

fn preview(data: &str) -> String {
    match data.get(..50) {
        Some(head) if data.len() > 50 => format!("{}...[{} chars total]", head, data.len()),
        _ => data.to_string(),
    }
}

pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.api_key.clone(), config.api_base.clone(), config.model.clone())
    }

    pub fn model(&self) -> &str { &self.model }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    async fn perform_api_call(&self, prompt: &str, image_base64: &str, mime_type: &str) -> std::result::Result<GeminiResponse, GeminiError> {
        let url = self.endpoint();
        info!("🔗 Making request to: {}", url);

        let request_body = json!({
            "contents": [{
                "parts": [
                    {"inlineData": {"mimeType": mime_type, "data": image_base64}},
                    {"text": prompt}
                ]
            }],
            "generationConfig": {
                "responseModalities": ["IMAGE"]
            }
        });
        debug!("📤 Request body: {}", loggable(&request_body));

        let response = self.client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| GeminiError::Transport(e.without_url()))?;

        let status = response.status();
        info!("📥 Response status: {}", status);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GeminiError::Status { status, body });
        }

        let response_text = response.text().await.map_err(|e| GeminiError::Transport(e.without_url()))?;
        let raw: serde_json::Value = serde_json::from_str(&response_text)?;
        debug!("📥 Raw Gemini API response: {}", loggable(&raw));

        Ok(serde_json::from_value(raw)?)
    }

    /// One attempt, no retries. Causes are logged; callers only ever see the generic message.
    pub async fn submit(&self, prompt: &str, image_base64: &str, mime_type: &str) -> Result<String> {
        info!("✨ Editing {} image with {}", mime_type, self.model);

        let parsed = match self.perform_api_call(prompt, image_base64, mime_type).await {
            Ok(parsed) => parsed,
            Err(e) => {
                error!("❌ Error calling Gemini API: {}", e);
                return Err(Error::RequestFailed);
            }
        };

        match extract_first_image_b64(&parsed) {
            Some(image_data) => {
                info!("✅ Received edited image: {}", preview(&image_data));
                Ok(image_data)
            }
            None => {
                log_missing_image(&parsed);
                Err(Error::NoImageInResponse)
            }
        }
    }
}

#[async_trait]
impl ImageEditor for GeminiClient {
    async fn submit(&self, request: &EditRequest) -> Result<String> {
        GeminiClient::submit(self, request.prompt_text(), request.image_base64(), request.mime_type()).await
    }
}

// --- Response Parsing Helpers ---

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default, rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
    #[serde(default, rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct Content { #[serde(default)] parts: Vec<Part> }

#[derive(Debug, Deserialize)]
struct PromptFeedback {
    #[serde(default, rename = "blockReason")]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Part {
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData
    },
    Text { text: String },
    Other(serde_json::Value)
}

#[derive(Debug, Deserialize)]
struct InlineData {
    #[serde(default)]
    data: String,
    #[serde(default, rename = "mimeType")]
    mime_type: String,
}

/// Candidates in order, parts in order, first non-empty inline payload wins.
fn extract_first_image_b64(resp: &GeminiResponse) -> Option<String> {
    for c in &resp.candidates {
        for p in &c.content.parts {
            if let Part::Inline { inline_data } = p {
                if inline_data.data.is_empty() {
                    continue;
                }
                info!("🎯 Found image data with mime type: {}", inline_data.mime_type);
                return Some(inline_data.data.clone());
            }
        }
    }
    None
}

fn log_missing_image(resp: &GeminiResponse) {
    if let Some(reason) = resp.prompt_feedback.as_ref().and_then(|f| f.block_reason.as_deref()) {
        warn!("⚠️ Prompt was blocked: {}", reason);
    }
    for (i, c) in resp.candidates.iter().enumerate() {
        let texts: Vec<&str> = c.content.parts.iter().filter_map(|p| match p {
            Part::Text { text } => Some(text.as_str()),
            _ => None,
        }).collect();
        warn!(
            "⚠️ Candidate {} carried no image (finish reason: {}, text: {:?})",
            i,
            c.finish_reason.as_deref().unwrap_or("unknown"),
            texts
        );
    }
    if resp.candidates.is_empty() {
        warn!("⚠️ No candidates in API response");
    }
}
