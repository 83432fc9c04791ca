use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderValue},
    response::Response,
    routing::get,
    Json, Router,
};
use guestvault_crypto::{PreviewKind, DEFAULT_MIME_TYPE};
use serde::Serialize;

use super::AppState;
use crate::db::FileRecord;
use crate::error::AppError;
use crate::middleware::apply_sandbox_headers;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/files", get(list_files))
        .route("/files/:id", get(file_detail))
        .route("/raw/:id", get(raw))
        .route("/download/:id", get(download))
}

/// Public view of a stored file.
#[derive(Debug, Serialize)]
pub struct FileView {
    pub id: i64,
    pub filename: String,
    pub content_type: String,
    pub size: i64,
    pub sha256: String,
    pub encrypted: bool,
    pub uploaded_at: String,
    pub download_count: i64,
    /// Only meaningful for plaintext uploads; envelopes carry their own type.
    pub preview: PreviewKind,
    pub raw_url: String,
    pub download_url: String,
}

impl From<FileRecord> for FileView {
    fn from(row: FileRecord) -> Self {
        let content_type = row
            .content_type
            .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string());
        Self {
            preview: PreviewKind::for_mime(&content_type),
            raw_url: format!("/raw/{}", row.id),
            download_url: format!("/download/{}", row.id),
            id: row.id,
            filename: row.filename_original,
            content_type,
            size: row.size,
            sha256: row.sha256,
            encrypted: row.encrypted,
            uploaded_at: row.uploaded_at,
            download_count: row.download_count,
        }
    }
}

#[derive(Serialize)]
struct ListFilesResponse {
    files: Vec<FileView>,
}

async fn list_files(State(state): State<AppState>) -> Result<Json<ListFilesResponse>, AppError> {
    let files = state
        .db
        .run(|db| db.list())
        .await?
        .into_iter()
        .map(FileView::from)
        .collect();
    Ok(Json(ListFilesResponse { files }))
}

async fn find(state: &AppState, id: i64) -> Result<FileRecord, AppError> {
    state
        .db
        .run(move |db| db.get(id))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("file not found: {id}")))
}

async fn file_detail(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<FileView>, AppError> {
    Ok(Json(find(&state, id).await?.into()))
}

async fn load_blob(state: &AppState, row: &FileRecord) -> Result<Vec<u8>, AppError> {
    state.store.read(&row.stored_relpath).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AppError::NotFound(format!("blob missing for file {}", row.id))
        } else {
            e.into()
        }
    })
}

fn content_type_header(row: &FileRecord) -> HeaderValue {
    row.content_type
        .as_deref()
        .and_then(|t| HeaderValue::from_str(t).ok())
        .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_MIME_TYPE))
}

/// Stored bytes, unchanged, under a sandboxing policy.
async fn raw(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Response, AppError> {
    let row = find(&state, id).await?;
    let data = load_blob(&state, &row).await?;

    let mut response = Response::new(Body::from(data));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, content_type_header(&row));
    apply_sandbox_headers(headers);
    Ok(response)
}

async fn download(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let row = find(&state, id).await?;
    let data = load_blob(&state, &row).await?;
    state
        .db
        .run(move |db| db.increment_download_count(id))
        .await?;

    let disposition = format!("attachment; filename=\"{}\"", row.filename_original);
    let mut response = Response::new(Body::from(data));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, content_type_header(&row));
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&disposition)
            .unwrap_or_else(|_| HeaderValue::from_static("attachment")),
    );
    Ok(response)
}
