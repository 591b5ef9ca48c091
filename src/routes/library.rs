//! Stored asset serving (`<id>.epub`, `<id>.txt`, `<id>.cover`)

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
    routing::get,
    Router,
};

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Create the library router
pub fn router() -> Router<AppState> {
    Router::new().route("/:asset", get(get_asset))
}

/// Stream a stored blob
async fn get_asset(State(state): State<AppState>, Path(asset): Path<String>) -> Result<Response> {
    let blob = state.blobs().get(&asset).await?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, blob.content_type)
        .header(header::CONTENT_LENGTH, blob.data.len())
        .header(header::CACHE_CONTROL, "public, max-age=31536000")
        .body(Body::from(blob.data))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))
}
