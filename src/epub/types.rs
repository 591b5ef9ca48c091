//! EPUB data types shared by the resolver and the converter

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Placeholder used when the package document has no usable `dc:title`
pub const UNTITLED: &str = "Untitled";

/// Placeholder used when the package document has no usable `dc:creator`
pub const UNKNOWN_AUTHOR: &str = "Unknown Author";

/// Manifest item from the package document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestItem {
    pub id: String,
    /// Archive path, already resolved against the package directory
    pub href: String,
    pub media_type: String,
    pub properties: Option<String>,
}

impl ManifestItem {
    /// Whether the `properties` token list contains `token`
    pub fn has_property(&self, token: &str) -> bool {
        self.properties
            .as_deref()
            .map(|props| props.split_whitespace().any(|p| p == token))
            .unwrap_or(false)
    }
}

/// Manifest items keyed by id. Iteration order is not significant.
pub type ManifestTable = HashMap<String, ManifestItem>;

/// Spine idrefs in declared reading order. May contain ids that are not
/// in the manifest.
pub type ReadingSequence = Vec<String>;

/// Book metadata derived from the package document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookMetadata {
    pub title: String,
    pub creator: String,
    /// Archive path of the cover image, when one was detected
    pub cover_path: Option<String>,
    /// Media type of the cover manifest entry
    pub cover_media_type: Option<String>,
    pub language: Option<String>,
    pub identifier: Option<String>,
}

impl Default for BookMetadata {
    fn default() -> Self {
        Self {
            title: UNTITLED.to_string(),
            creator: UNKNOWN_AUTHOR.to_string(),
            cover_path: None,
            cover_media_type: None,
            language: None,
            identifier: None,
        }
    }
}

/// Resolved package document
#[derive(Debug, Clone)]
pub struct Package {
    /// Archive path of the package document (the `.opf` file)
    pub package_path: String,
    /// Directory containing the package document, without trailing slash
    pub base_dir: String,
    pub manifest: ManifestTable,
    pub spine: ReadingSequence,
    pub metadata: BookMetadata,
}

/// Markdown text of a whole book, in reading order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedText {
    text: String,
    blocks: usize,
}

impl ConvertedText {
    /// Start a new text with the title/author header block
    pub(crate) fn with_header(metadata: &BookMetadata) -> Self {
        let mut text = String::new();
        text.push_str(&metadata.title);
        text.push_str("\n\n");
        text.push_str("By: ");
        text.push_str(&metadata.creator);
        text.push_str("\n\n");
        text.push_str("---\n\n");
        Self { text, blocks: 0 }
    }

    /// Append one converted content block followed by a blank line
    pub(crate) fn push_block(&mut self, block: &str) {
        self.text.push_str(block);
        self.text.push_str("\n\n");
        self.blocks += 1;
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }

    /// Number of content blocks appended after the header
    pub fn block_count(&self) -> usize {
        self.blocks
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}
