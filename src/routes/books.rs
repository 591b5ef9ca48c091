//! Book API endpoints
//!
//! - Upload an EPUB (ingestion)
//! - List and fetch ebook records
//! - Save the reader's position

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::Serialize;

use crate::db::{Ebook, EbookRepository, LocationUpdate};
use crate::error::{AppError, Result};
use crate::state::AppState;

/// Multipart field names accepted for the uploaded file
const FILE_FIELDS: [&str; 3] = ["ebookFile", "file", "epub"];

/// Response for book list
#[derive(Serialize)]
pub struct BookListResponse {
    pub books: Vec<Ebook>,
    pub total: usize,
}

/// Upload response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub id: String,
    pub title: String,
    pub authors: String,
    pub has_cover: bool,
}

/// Create the books router
pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/", get(list_books).post(upload_book))
        .route("/:id", get(get_book))
        .route("/:id/location", put(update_location))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

/// An uploaded file taken from the multipart body
struct Upload {
    filename: String,
    data: Vec<u8>,
}

fn is_epub_filename(filename: &str) -> bool {
    filename.to_lowercase().ends_with(".epub")
}

async fn read_upload(multipart: &mut Multipart) -> Result<Option<Upload>> {
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::warn!("Failed to read multipart field: {}", e);
        AppError::BadRequest(format!("Failed to read upload: {}", e.body_text()))
    })? {
        let name = field.name().unwrap_or("").to_string();
        if !FILE_FIELDS.contains(&name.as_str()) {
            tracing::debug!(field = %name, "Ignoring multipart field");
            continue;
        }

        let filename = field.file_name().unwrap_or("").to_string();
        let data = field.bytes().await.map_err(|e| {
            tracing::warn!("Failed to read file data: {}", e);
            AppError::BadRequest(format!("Failed to read upload: {}", e.body_text()))
        })?;

        // An empty file input is submitted as a nameless, empty part
        if filename.is_empty() && data.is_empty() {
            return Ok(None);
        }

        return Ok(Some(Upload {
            filename,
            data: data.to_vec(),
        }));
    }

    Ok(None)
}

/// Upload and ingest an EPUB
async fn upload_book(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>)> {
    let upload = read_upload(&mut multipart)
        .await?
        .ok_or_else(|| AppError::BadRequest("EPUB file is required".to_string()))?;

    if !is_epub_filename(&upload.filename) {
        tracing::debug!(filename = %upload.filename, "Rejected non-EPUB upload");
        return Err(AppError::BadRequest("Please upload an EPUB file".to_string()));
    }

    tracing::debug!(filename = %upload.filename, size = upload.data.len(), "Received EPUB upload");

    let book = state.ingest().ingest(upload.data).await?;
    let has_cover = book.has_cover();

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            id: book.ebook.id,
            title: book.ebook.title,
            authors: book.ebook.authors,
            has_cover,
        }),
    ))
}

/// List all ebook records
async fn list_books(State(state): State<AppState>) -> Result<Json<BookListResponse>> {
    let books = EbookRepository::new(state.db()).list().await?;
    let total = books.len();

    Ok(Json(BookListResponse { books, total }))
}

/// Get one ebook record
async fn get_book(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Ebook>> {
    EbookRepository::new(state.db())
        .get(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Book not found: {}", id)))
}

/// Save the reading position
async fn update_location(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<LocationUpdate>,
) -> Result<Json<Ebook>> {
    EbookRepository::new(state.db())
        .update_location(&id, &update)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Book not found: {}", id)))
}
