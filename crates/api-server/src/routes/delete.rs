use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::AppState;
use crate::error::AppError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/files/:id/delete", post(delete_file))
        .route("/files/bulk-delete", post(bulk_delete))
}

#[derive(Deserialize)]
struct BulkDeleteRequest {
    #[serde(default)]
    ids: Vec<Value>,
}

/// Accept numbers or numeric strings; anything else is skipped.
fn parse_ids(raw: &[Value]) -> Vec<i64> {
    raw.iter()
        .filter_map(|v| match v {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
        .collect()
}

async fn delete_file(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    if state.db.run(move |db| db.get(id)).await?.is_none() {
        return Err(AppError::NotFound(format!("file not found: {id}")));
    }
    let deleted = remove(&state, &[id]).await?;
    Ok(Json(json!({ "deleted": deleted })))
}

async fn bulk_delete(
    State(state): State<AppState>,
    Json(body): Json<BulkDeleteRequest>,
) -> Result<Json<Value>, AppError> {
    let ids = parse_ids(&body.ids);
    if ids.is_empty() {
        return Ok(Json(json!({ "deleted": 0 })));
    }
    let deleted = remove(&state, &ids).await?;
    Ok(Json(json!({ "deleted": deleted })))
}

/// Delete rows, then drop each blob no remaining row points at.
async fn remove(state: &AppState, ids: &[i64]) -> Result<usize, AppError> {
    let _refs = state.store.lock_refs().await;
    let ids = ids.to_vec();
    let rows = state.db.run(move |db| db.delete_many(&ids)).await?;
    for row in &rows {
        let relpath = row.stored_relpath.clone();
        if state.db.run(move |db| db.count_by_relpath(&relpath)).await? == 0 {
            if let Err(e) = state.store.remove(&row.stored_relpath).await {
                tracing::warn!(id = row.id, error = %e, "failed to remove blob");
            }
        }
    }
    tracing::info!(count = rows.len(), "deleted files");
    Ok(rows.len())
}
