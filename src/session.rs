//! One edit session: the selected image, the prompt, and the result of the
//! latest submission.
//!
//! Every submission and every image selection bumps a generation counter.
//! A completing request only writes its result if its generation is still the
//! current one, so a slow response can never overwrite a newer state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::codec::{self, FileHandle};
use crate::error::{Result, REQUEST_FAILED_MESSAGE};
use crate::gemini::ImageEditor;
use crate::models::{EditRequest, EditResult, SessionSnapshot, UploadedImage};

#[derive(Debug)]
struct SessionState {
    image: Option<Arc<UploadedImage>>,
    prompt: String,
    result: EditResult,
    generation: u64,
    selection: u64,
    updated_at: DateTime<Utc>,
}

impl SessionState {
    fn transition(&mut self, result: EditResult) {
        self.result = result;
        self.updated_at = Utc::now();
    }

    fn replace_image(&mut self, image: UploadedImage) {
        info!("📎 Selected image '{}' ({})", image.raw_file().name(), image.mime_type());
        self.image = Some(Arc::new(image));
        self.generation += 1;
        self.transition(EditResult::Idle);
    }
}

/// What happened to a call to [`EditSession::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The result was written to the session.
    Completed(EditResult),
    /// A newer submission or image selection happened first; the result was dropped.
    Superseded,
}

pub struct EditSession {
    editor: Arc<dyn ImageEditor>,
    state: Mutex<SessionState>,
}

impl EditSession {
    pub fn new(editor: Arc<dyn ImageEditor>) -> Self {
        Self {
            editor,
            state: Mutex::new(SessionState {
                image: None,
                prompt: String::new(),
                result: EditResult::Idle,
                generation: 0,
                selection: 0,
                updated_at: Utc::now(),
            }),
        }
    }

    /// Replaces the current image and clears any displayed result.
    pub fn select_image(&self, image: UploadedImage) {
        let mut state = self.state.lock();
        state.selection += 1;
        state.replace_image(image);
    }

    /// Encodes `file` and selects it. On error the session is left untouched.
    ///
    /// The selection order is fixed when the call starts: if another image is
    /// selected while this file is still being read, this one is dropped.
    pub async fn select_file(&self, file: FileHandle) -> Result<()> {
        let ticket = self.reserve_selection();
        let image = codec::encode(file).await?;
        self.finish_selection(ticket, image);
        Ok(())
    }

    fn reserve_selection(&self) -> u64 {
        let mut state = self.state.lock();
        state.selection += 1;
        state.selection
    }

    fn finish_selection(&self, ticket: u64, image: UploadedImage) -> bool {
        let mut state = self.state.lock();
        if state.selection != ticket {
            info!("🗑️ Dropping '{}', a newer image was selected meanwhile", image.raw_file().name());
            return false;
        }
        state.replace_image(image);
        true
    }

    pub fn update_prompt(&self, text: impl Into<String>) {
        self.state.lock().prompt = text.into();
    }

    pub fn result(&self) -> EditResult {
        self.state.lock().result.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock();
        SessionSnapshot {
            has_image: state.image.is_some(),
            preview: state.image.as_ref().map(|i| i.encoded_preview().to_string()),
            prompt: state.prompt.clone(),
            result: state.result.clone(),
            updated_at: state.updated_at,
        }
    }

    /// Sends the current image and prompt to the editor.
    ///
    /// Without an image or with a blank prompt the session goes straight to
    /// `Failure` and the editor is never called. Otherwise the session is
    /// `Loading` until the editor settles, and the outcome is only recorded if
    /// nothing newer happened in the meantime.
    pub async fn submit(&self) -> SubmitOutcome {
        let (generation, request) = {
            let mut state = self.state.lock();
            state.generation += 1;
            match EditRequest::new(state.image.as_deref(), &state.prompt) {
                Ok(request) => {
                    state.transition(EditResult::Loading);
                    (state.generation, request)
                }
                Err(e) => {
                    warn!("⚠️ Edit rejected before dispatch: {}", e);
                    let result = EditResult::Failure(e.to_string());
                    state.transition(result.clone());
                    return SubmitOutcome::Completed(result);
                }
            }
        };

        info!("🚀 Dispatching edit #{}: {}", generation, request.prompt_text());
        let mut guard = LoadingGuard { state: &self.state, generation, armed: true };
        let outcome = self.editor.submit(&request).await;
        guard.armed = false;

        let result = match outcome {
            Ok(image_base64) => {
                let mime = codec::sniff_mime(&image_base64);
                EditResult::Success(codec::to_data_uri(&image_base64, mime))
            }
            Err(e) => EditResult::Failure(e.to_string()),
        };
        self.complete(generation, result)
    }

    fn complete(&self, generation: u64, result: EditResult) -> SubmitOutcome {
        let mut state = self.state.lock();
        if state.generation != generation {
            info!("🗑️ Discarding stale result of edit #{} (current is #{})", generation, state.generation);
            return SubmitOutcome::Superseded;
        }
        match &result {
            EditResult::Success(_) => info!("✅ Edit #{} succeeded", generation),
            EditResult::Failure(message) => warn!("❌ Edit #{} failed: {}", generation, message),
            _ => {}
        }
        state.transition(result.clone());
        SubmitOutcome::Completed(result)
    }
}

/// Clears `Loading` if a submission is abandoned before the editor settles
/// (the future was dropped or the editor panicked).
struct LoadingGuard<'a> {
    state: &'a Mutex<SessionState>,
    generation: u64,
    armed: bool,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.state.lock();
        if state.generation == self.generation && state.result.is_loading() {
            warn!("❌ Edit #{} abandoned while in flight", self.generation);
            state.transition(EditResult::Failure(REQUEST_FAILED_MESSAGE.to_string()));
        }
    }
}
