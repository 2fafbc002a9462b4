use thiserror::Error;

/// Message shown when an edit is submitted without an image or without a prompt.
pub const VALIDATION_MESSAGE: &str = "Please upload an image and provide an editing prompt.";

/// Message surfaced for any transport or model failure. The underlying cause is logged, never returned.
pub const REQUEST_FAILED_MESSAGE: &str = "Failed to generate image. Please check your prompt or try again.";

pub const NO_IMAGE_MESSAGE: &str = "No image was generated in the response.";

/// Every failure an edit cycle can end in. `Display` is the user-facing message.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{}", VALIDATION_MESSAGE)]
    Validation,

    #[error("Could not read file {name}: {source}")]
    Read {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported file type {mime}: only images can be edited")]
    UnsupportedType { mime: String },

    #[error("Upload is too large: the limit is {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("{}", NO_IMAGE_MESSAGE)]
    NoImageInResponse,

    #[error("{}", REQUEST_FAILED_MESSAGE)]
    RequestFailed,

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
