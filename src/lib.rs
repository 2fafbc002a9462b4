//! Gemini Image Editor.
//!
//! Upload an image, describe an edit in plain language, and get the edited
//! image back from an image-capable Gemini model.
//!
//! ```no_run
//! use std::sync::Arc;
//! use gemini_image_editor::{codec::FileHandle, gemini::GeminiClient, session::EditSession};
//!
//! # async fn run() -> gemini_image_editor::Result<()> {
//! let client = GeminiClient::new("api-key", gemini_image_editor::config::DEFAULT_API_BASE, "gemini-2.5-flash-image");
//! let session = EditSession::new(Arc::new(client));
//! session.select_file(FileHandle::from_path("cat.png")).await?;
//! session.update_prompt("give the cat a tiny wizard hat");
//! session.submit().await;
//! println!("{:?}", session.result());
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod gemini;
pub mod models;
pub mod routes;
pub mod session;

pub use error::{Error, Result};
pub use models::{EditRequest, EditResult, UploadedImage};
pub use session::{EditSession, SubmitOutcome};
