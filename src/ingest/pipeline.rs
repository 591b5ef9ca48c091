//! Synchronous ingestion stages: container, package, conversion

use crate::epub::{convert, resolve, BookMetadata, Container, ConvertedText};

use super::IngestError;

/// Output of the synchronous stages, ready for publishing
#[derive(Debug, Clone)]
pub struct IngestionResult {
    pub id: String,
    pub metadata: BookMetadata,
    pub text: ConvertedText,
    /// The uploaded archive, byte for byte
    pub archive: Vec<u8>,
    /// Cover image bytes, when a cover was detected and could be read
    pub cover: Option<Vec<u8>>,
}

impl IngestionResult {
    pub fn cover_bytes(&self) -> Option<&[u8]> {
        self.cover.as_deref()
    }
}

/// Open, resolve and convert an uploaded archive, and pull out its cover.
///
/// Blocking; call from `spawn_blocking` in async contexts.
pub fn run(id: String, archive: Vec<u8>) -> Result<IngestionResult, IngestError> {
    let (metadata, text, cover) = {
        let mut container = Container::open(&archive)?;
        let package = resolve(&mut container)?;
        let text = convert(&mut container, &package);
        let cover = extract_cover(&id, &mut container, &package.metadata);
        (package.metadata, text, cover)
    };

    tracing::debug!(
        id = %id,
        title = %metadata.title,
        blocks = text.block_count(),
        chars = text.len(),
        has_cover = cover.is_some(),
        "Converted EPUB"
    );

    Ok(IngestionResult {
        id,
        metadata,
        text,
        archive,
        cover,
    })
}

/// Read the resolved cover entry. Failures are logged and yield `None`.
fn extract_cover(id: &str, container: &mut Container<'_>, metadata: &BookMetadata) -> Option<Vec<u8>> {
    let path = metadata.cover_path.as_deref()?;

    match container.read(path) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            tracing::warn!(id = %id, cover = %path, error = %e, "Failed to extract cover");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epub::fixtures::{sample_epub, zip_entries, EpubBuilder};

    #[test]
    fn test_run_sample() {
        let bytes = sample_epub();
        let result = run("book1".to_string(), bytes.clone()).unwrap();

        assert_eq!(result.id, "book1");
        assert_eq!(result.metadata.title, "The Sample");
        assert_eq!(result.metadata.creator, "Ada Writer");
        assert_eq!(result.archive, bytes);
        assert!(result.text.as_str().starts_with("The Sample\n\nBy: Ada Writer\n\n---\n\n"));
        assert_eq!(result.cover_bytes(), Some(&b"\xFF\xD8\xFFfake-jpeg"[..]));
    }

    #[test]
    fn test_run_rejects_non_zip() {
        let result = run("x".to_string(), b"definitely not a zip".to_vec());
        assert!(matches!(result, Err(IngestError::InvalidArchive(_))));
    }

    #[test]
    fn test_run_rejects_missing_container_pointer() {
        let bytes = zip_entries(&[
            ("mimetype", b"application/epub+zip".as_slice()),
            ("OEBPS/a.xhtml", b"<p/>".as_slice()),
        ]);
        let result = run("x".to_string(), bytes);
        assert!(matches!(result, Err(IngestError::InvalidPackage(_))));
    }

    #[test]
    fn test_cover_missing_from_archive() {
        let bytes = EpubBuilder::new()
            .item("cover", "cover.png", "image/png", Some("cover-image"))
            .item("c1", "c1.xhtml", "application/xhtml+xml", None)
            .spine("c1")
            .chapter("OEBPS/c1.xhtml", "<p>Text</p>")
            .build();

        let result = run("x".to_string(), bytes).unwrap();
        assert_eq!(result.metadata.cover_path.as_deref(), Some("OEBPS/cover.png"));
        assert!(result.cover.is_none());
    }
}
