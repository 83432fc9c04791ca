use std::net::SocketAddr;

use anyhow::Context;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use guestvault_server::config::AppConfig;
use guestvault_server::db::Database;
use guestvault_server::routes::{self, AppState};
use guestvault_server::storage::BlobStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "guestvault_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    tracing::debug!(
        data_dir = %config.data_dir.display(),
        max_content_length = config.max_content_length,
        "loaded app config"
    );

    let store = BlobStore::new(config.upload_dir());
    store
        .ensure_dirs()
        .await
        .with_context(|| format!("failed to create {}", store.root().display()))?;
    let db = Database::open(&config.db_path())
        .with_context(|| format!("failed to open {}", config.db_path().display()))?;

    let state = AppState {
        db,
        store,
        config: config.clone(),
    };
    let app = routes::app(state).layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
