//! Image uploads and the multipart plumbing shared with CSV import.

use std::collections::HashMap;

use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, State, multipart::MultipartError},
    extract::multipart::MultipartRejection,
    http::StatusCode,
    routing::post,
};
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::extract::Json;
use crate::middleware::RequireAuth;
use crate::services::media::{MediaError, StoredMedia, UploadFolder};
use crate::state::AppState;

/// Slack on top of the file limit for multipart framing and text fields.
pub const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Name of the form field carrying the file.
const FILE_FIELD: &str = "file";

/// Longest text field accepted alongside the file.
const MAX_TEXT_FIELD: usize = 256;

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", post(upload))
        .layer(body_limit(state))
}

/// Body limit for routes that accept one uploaded file.
pub(crate) fn body_limit(state: &AppState) -> DefaultBodyLimit {
    DefaultBodyLimit::max(state.media().max_bytes() + MULTIPART_OVERHEAD)
}

/// The uploaded file of a multipart form.
#[derive(Debug)]
pub(crate) struct FilePart {
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// A parsed multipart form: at most one file plus short text fields.
#[derive(Debug, Default)]
pub(crate) struct UploadForm {
    pub file: Option<FilePart>,
    pub fields: HashMap<String, String>,
}

fn multipart_error(err: &MultipartError, max_bytes: usize) -> MediaError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        MediaError::TooLarge { max: max_bytes }
    } else {
        MediaError::Multipart(err.body_text())
    }
}

/// Read a multipart body, enforcing `max_bytes` on the file while streaming.
pub(crate) async fn read_form(
    multipart: std::result::Result<Multipart, MultipartRejection>,
    max_bytes: usize,
) -> Result<UploadForm> {
    let mut multipart = multipart.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            MediaError::TooLarge { max: max_bytes }
        } else {
            MediaError::Multipart(rejection.body_text())
        }
    })?;
    let mut form = UploadForm::default();

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(&e, max_bytes))?
    {
        let name = field.name().unwrap_or_default().to_owned();

        if name == FILE_FIELD {
            if form.file.is_some() {
                return Err(MediaError::MultipleFiles.into());
            }
            let content_type = field.content_type().map(str::to_owned);
            let mut bytes = Vec::new();
            while let Some(chunk) = field
                .chunk()
                .await
                .map_err(|e| multipart_error(&e, max_bytes))?
            {
                if bytes.len() + chunk.len() > max_bytes {
                    return Err(MediaError::TooLarge { max: max_bytes }.into());
                }
                bytes.extend_from_slice(&chunk);
            }
            form.file = Some(FilePart {
                content_type,
                bytes,
            });
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| multipart_error(&e, max_bytes))?;
            if value.len() > MAX_TEXT_FIELD {
                return Err(AppError::BadRequest(format!("field '{name}' is too long")));
            }
            form.fields.insert(name, value);
        }
    }

    Ok(form)
}

/// Store one image and return where it can be fetched.
#[instrument(skip(state, user, multipart), fields(user_id = %user.id))]
async fn upload(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<StoredMedia>)> {
    let media = state.media();
    let form = read_form(multipart, media.max_bytes()).await?;

    let folder = form
        .fields
        .get("folder")
        .map_or(Ok(UploadFolder::default()), |value| value.parse::<UploadFolder>())?;
    let file = form.file.ok_or(MediaError::MissingFile)?;
    let content_type = file.content_type.unwrap_or_default();

    let stored = media.upload(folder, &content_type, file.bytes).await?;
    tracing::info!(key = %stored.key, folder = folder.as_str(), "Upload stored");
    Ok((StatusCode::CREATED, Json(stored)))
}
