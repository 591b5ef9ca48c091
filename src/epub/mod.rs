//! EPUB parsing module
//!
//! Opens the zip container, resolves the package document (manifest,
//! spine, metadata) and converts the spine's markup documents to a
//! single markdown text.

mod container;
mod convert;
pub mod markdown;
mod package;
mod types;

#[cfg(test)]
pub(crate) mod fixtures;

pub use container::{decode_text, Container, CONTAINER_POINTER};
pub use convert::{convert, is_markup};
pub use package::{resolve, resolve_href};
pub use types::{
    BookMetadata, ConvertedText, ManifestItem, ManifestTable, Package, ReadingSequence,
    UNKNOWN_AUTHOR, UNTITLED,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EpubError {
    #[error("Invalid EPUB archive: {0}")]
    InvalidArchive(#[from] zip::result::ZipError),

    #[error("Entry not found in archive: {0}")]
    EntryNotFound(String),

    #[error("Failed to read entry {path}: {source}")]
    EntryRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid EPUB: META-INF/container.xml not found")]
    MissingContainerPointer,

    #[error("Invalid EPUB: rootfile path not found in container.xml")]
    MissingPackagePath,

    #[error("Invalid EPUB: package document not found at {0}")]
    MissingPackageDocument(String),

    #[error("Malformed XML in {path}: {reason}")]
    MalformedXml { path: String, reason: String },
}

impl EpubError {
    /// Whether the error means the package structure (container pointer or
    /// package document) is unusable, as opposed to the zip stream itself.
    pub fn is_invalid_package(&self) -> bool {
        matches!(
            self,
            EpubError::MissingContainerPointer
                | EpubError::MissingPackagePath
                | EpubError::MissingPackageDocument(_)
                | EpubError::MalformedXml { .. }
        )
    }
}
