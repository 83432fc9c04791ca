use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

use super::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/healthz", get(health_check))
}

async fn health_check() -> Json<Value> {
    Json(json!({ "ok": true }))
}
