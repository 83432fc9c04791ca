//! Upload endpoint. The blob is stored exactly as received; an encrypted
//! upload is an opaque envelope this server never parses.

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    response::Redirect,
    routing::post,
    Router,
};
use guestvault_crypto::DEFAULT_MIME_TYPE;

use super::AppState;
use crate::db::NewFile;
use crate::error::AppError;
use crate::storage::secure_filename;

/// Used when sanitizing leaves nothing of the client's filename.
const FALLBACK_FILENAME: &str = "upload";

pub fn router() -> Router<AppState> {
    Router::new().route("/upload", post(upload))
}

struct FilePart {
    filename: String,
    content_type: Option<String>,
    data: Vec<u8>,
}

async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Redirect, AppError> {
    let mut multipart = multipart
        .map_err(|e| AppError::BadRequest(format!("failed to parse form data: {e}")))?;

    let mut file: Option<FilePart> = None;
    let mut encrypted = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("malformed form data: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await.map_err(|e| {
                    AppError::BadRequest(format!("failed to read file field: {e}"))
                })?;
                file = Some(FilePart {
                    filename,
                    content_type,
                    data: data.to_vec(),
                });
            }
            "encrypted" => {
                let value = field.text().await.map_err(|e| {
                    AppError::BadRequest(format!("failed to read encrypted field: {e}"))
                })?;
                encrypted = value.trim() == "1";
            }
            _ => {}
        }
    }

    let file = file.ok_or_else(|| AppError::BadRequest("no file part".into()))?;
    if file.filename.is_empty() {
        return Err(AppError::BadRequest("no selected file".into()));
    }

    let mut filename = secure_filename(&file.filename);
    if filename.is_empty() {
        filename = FALLBACK_FILENAME.to_string();
    }

    // Envelopes must never be sniffed or previewed server-side.
    let content_type = if encrypted {
        DEFAULT_MIME_TYPE.to_string()
    } else {
        file.content_type
            .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string())
    };

    let _refs = state.store.lock_refs().await;
    let blob = state.store.store(&file.data, &filename).await?;
    let size = blob.size;
    let record = NewFile {
        filename_original: filename.clone(),
        stored_relpath: blob.relpath,
        content_type: Some(content_type),
        size: size as i64,
        sha256: blob.sha256,
        encrypted,
        uploaded_at: chrono::Utc::now().to_rfc3339(),
    };
    let id = state.db.run(move |db| db.insert(&record)).await?;

    tracing::info!(id, filename = %filename, size, encrypted, "stored upload");
    Ok(Redirect::to(&format!("/files/{id}")))
}
