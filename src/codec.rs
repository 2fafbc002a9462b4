//! File ingestion and data-URI encoding.
//!
//! A selected file becomes a `data:<mime>;base64,<payload>` string, which is
//! both the preview shown to the user and the source of the payload sent to
//! Gemini.

use std::fmt;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::models::UploadedImage;

/// MIME type assumed for returned images whose format cannot be sniffed.
pub const FALLBACK_IMAGE_MIME: &str = "image/png";

#[derive(Debug, Clone)]
pub enum FileSource {
    Disk(PathBuf),
    Memory(Bytes),
}

/// A user-selected file that has not been read yet.
#[derive(Debug, Clone)]
pub struct FileHandle {
    name: String,
    declared_type: String,
    source: FileSource,
}

impl FileHandle {
    /// Declared type is guessed from the extension.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let declared_type = mime_guess::from_path(path)
            .first()
            .map(|m| m.essence_str().to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self { name, declared_type, source: FileSource::Disk(path.to_path_buf()) }
    }

    pub fn from_bytes(name: impl Into<String>, declared_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
            source: FileSource::Memory(bytes.into()),
        }
    }

    pub fn name(&self) -> &str { &self.name }

    pub fn declared_type(&self) -> &str { &self.declared_type }

    pub fn source(&self) -> &FileSource { &self.source }

    /// Only the declared type is consulted; content is not inspected.
    pub fn is_image(&self) -> bool {
        is_image_type(&self.declared_type)
    }

    fn mime_type(&self) -> String {
        essence(&self.declared_type)
    }

    async fn read(&self) -> std::io::Result<Bytes> {
        match &self.source {
            FileSource::Disk(path) => tokio::fs::read(path).await.map(Bytes::from),
            FileSource::Memory(bytes) => Ok(bytes.clone()),
        }
    }
}

/// Declared type without parameters, lowercased.
fn essence(declared_type: &str) -> String {
    declared_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

pub fn is_image_type(declared_type: &str) -> bool {
    essence(declared_type).starts_with("image/")
}

/// A `data:` URI produced by [`encode_bytes`]. Always contains exactly one `,`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct EncodedImage(String);

impl EncodedImage {
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for EncodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw transport payload recovered from an [`EncodedImage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub base64: String,
    pub mime_type: String,
}

/// Reads the file and encodes it as a data URI. Non-image files are rejected
/// before any read happens.
pub async fn encode(file: FileHandle) -> Result<UploadedImage> {
    if !file.is_image() {
        warn!("🚫 Rejecting non-image file '{}' ({})", file.name(), file.declared_type());
        return Err(Error::UnsupportedType { mime: file.declared_type().to_string() });
    }

    let bytes = file.read().await.map_err(|source| Error::Read {
        name: file.name().to_string(),
        source,
    })?;

    let mime_type = file.mime_type();
    let encoded = encode_bytes(&bytes, &mime_type);
    info!("🖼️ Encoded '{}' ({}, {} bytes)", file.name(), mime_type, bytes.len());

    Ok(UploadedImage::new(file, encoded, mime_type))
}

pub fn encode_bytes(bytes: &[u8], mime_type: &str) -> EncodedImage {
    EncodedImage(to_data_uri(&STANDARD.encode(bytes), mime_type))
}

pub fn to_data_uri(base64: &str, mime_type: &str) -> String {
    format!("data:{mime_type};base64,{base64}")
}

/// Splits a data URI at its `,` into MIME type and base64 payload.
pub fn extract_payload(encoded: &EncodedImage) -> Payload {
    let (meta, data) = encoded.0.split_once(',').unwrap_or(("", encoded.0.as_str()));
    let mime_type = meta
        .strip_prefix("data:")
        .and_then(|m| m.split(';').next())
        .unwrap_or_default()
        .to_string();
    Payload { base64: data.to_string(), mime_type }
}

/// Guesses the MIME type of a base64 payload from its magic bytes.
pub fn sniff_mime(base64: &str) -> &'static str {
    // 32 base64 chars decode to 24 bytes, enough for every signature `image` knows.
    let head = base64.get(..32).unwrap_or(base64);
    let guessed = STANDARD
        .decode(head)
        .ok()
        .and_then(|bytes| image::guess_format(&bytes).ok())
        .map(|format| format.to_mime_type());
    match guessed {
        Some(mime) => mime,
        None => {
            debug!("Could not sniff image format, assuming {}", FALLBACK_IMAGE_MIME);
            FALLBACK_IMAGE_MIME
        }
    }
}
