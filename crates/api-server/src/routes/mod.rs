use axum::{
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    Router,
};

use crate::config::AppConfig;
use crate::db::Database;
use crate::middleware::{require_admin, security_headers};
use crate::storage::BlobStore;

pub mod delete;
pub mod files;
mod health;
pub mod upload;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub store: BlobStore,
    pub config: AppConfig,
}

/// Public routes plus admin routes behind the bearer-token check.
pub fn router_with_auth(state: AppState) -> Router<AppState> {
    let admin = Router::new()
        .merge(delete::router())
        .route_layer(from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .merge(health::router())
        .merge(upload::router())
        .merge(files::router())
        .merge(admin)
        .layer(DefaultBodyLimit::max(state.config.max_content_length))
        .layer(from_fn(security_headers))
}

/// The complete application with state applied.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(router_with_auth(state.clone()))
        .with_state(state)
}
