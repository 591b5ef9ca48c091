//! Storage types

/// Content type for stored original archives
pub const EPUB_CONTENT_TYPE: &str = "application/epub+zip";

/// Content type for stored converted text
pub const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Content type assumed for `.cover` blobs when the backend has none
pub const DEFAULT_COVER_CONTENT_TYPE: &str = "image/jpeg";

/// A blob with its content type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub data: Vec<u8>,
    pub content_type: String,
}

/// Guess a content type from a storage key's suffix
pub fn guess_content_type(key: &str) -> String {
    let ext = key.rsplit('.').next().unwrap_or("").to_lowercase();
    match ext.as_str() {
        "epub" => EPUB_CONTENT_TYPE.to_string(),
        "txt" => TEXT_CONTENT_TYPE.to_string(),
        "cover" => DEFAULT_COVER_CONTENT_TYPE.to_string(),
        _ => mime_guess::from_path(key)
            .first()
            .map(|m| m.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string()),
    }
}
