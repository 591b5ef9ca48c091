//! Route modules for Shelf Server

pub mod books;
pub mod health;
pub mod library;

use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the application router
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let max_upload_bytes = state.config().ingest.max_upload_bytes;

    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/v1/health", get(health::health_check))
        .nest("/api/v1/books", books::router(max_upload_bytes))
        .nest("/library", library::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Router over a local blob store in `dir` and an in-memory database
#[cfg(test)]
pub(crate) async fn test_app(dir: &tempfile::TempDir) -> (Router, AppState) {
    use std::sync::Arc;

    use crate::config::Config;
    use crate::db::create_pool;
    use crate::storage::LocalBlobStore;

    let pool = create_pool("sqlite::memory:").await.unwrap();
    let store = Arc::new(LocalBlobStore::new(dir.path()));
    let state = AppState::new(Config::default(), store, pool);
    (app(state.clone()), state)
}
