use axum::{
    Extension, Json, Router,
    extract::{DefaultBodyLimit, Multipart, State, multipart::MultipartError},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

use crate::{
    codec::{self, FileHandle},
    error::Error,
    models::{PromptUpdate, SessionSnapshot},
    session::{EditSession, SubmitOutcome},
};

/// Largest accepted upload. Gemini rejects inline payloads above roughly this size anyway.
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Multipart field carrying the image.
pub const IMAGE_FIELD: &str = "image";

#[derive(Clone)]
pub struct AppState {
    pub session: Arc<EditSession>,
}

impl AppState {
    pub fn new(session: Arc<EditSession>) -> Self { Self { session } }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::Validation | Error::Read { .. } => StatusCode::BAD_REQUEST,
            Error::UnsupportedType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Error::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Error::NoImageInResponse | Error::RequestFailed => StatusCode::BAD_GATEWAY,
            Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Clone)]
struct UploadLimit(usize);

fn multipart_error(name: &str, limit: usize, e: MultipartError) -> Error {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        tracing::warn!("🚫 Upload '{}' exceeds {} bytes", name, limit);
        return Error::PayloadTooLarge { limit };
    }
    Error::Read {
        name: name.to_string(),
        source: std::io::Error::other(e),
    }
}

pub fn router(state: AppState) -> Router {
    router_with_upload_limit(state, MAX_UPLOAD_BYTES)
}

pub fn router_with_upload_limit(state: AppState, limit: usize) -> Router {
    Router::new()
        .route("/api/session", get(get_session))
        .route("/api/image", post(upload_image))
        .route("/api/prompt", put(update_prompt))
        .route("/api/submit", post(submit_edit))
        .layer(
            ServiceBuilder::new()
                .layer(DefaultBodyLimit::max(limit))
                .layer(Extension(UploadLimit(limit)))
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any)
                ),
        )
        .with_state(state)
}

pub async fn get_session(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.session.snapshot())
}

// Non-image uploads are refused from the part headers, before the body is read.
pub async fn upload_image(
    State(state): State<AppState>,
    Extension(UploadLimit(limit)): Extension<UploadLimit>,
    mut multipart: Multipart,
) -> Result<Json<SessionSnapshot>, Error> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error("upload", limit, e))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let name = field.file_name().unwrap_or("upload").to_string();
        let declared_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        tracing::info!("📥 Upload '{}' ({})", name, declared_type);

        if !codec::is_image_type(&declared_type) {
            tracing::warn!("🚫 Refusing '{}': {} is not an image", name, declared_type);
            return Err(Error::UnsupportedType { mime: declared_type });
        }

        let bytes = field.bytes().await.map_err(|e| multipart_error(&name, limit, e))?;
        state
            .session
            .select_file(FileHandle::from_bytes(name, declared_type, bytes))
            .await?;
        return Ok(Json(state.session.snapshot()));
    }

    Err(Error::Read {
        name: "upload".to_string(),
        source: std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("no `{IMAGE_FIELD}` field in form"),
        ),
    })
}

pub async fn update_prompt(
    State(state): State<AppState>,
    Json(body): Json<PromptUpdate>,
) -> Json<SessionSnapshot> {
    state.session.update_prompt(body.prompt);
    Json(state.session.snapshot())
}

/// Runs one edit to completion and returns the session as it stands afterwards.
pub async fn submit_edit(State(state): State<AppState>) -> Json<SessionSnapshot> {
    if let SubmitOutcome::Superseded = state.session.submit().await {
        tracing::info!("Submission superseded, returning current session state");
    }
    Json(state.session.snapshot())
}
