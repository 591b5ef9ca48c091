//! Shelf Server
//!
//! Ingests uploaded EPUB files into a reading library: the original
//! archive, a markdown text rendition and the cover image are stored as
//! blobs, and an ebook record is created for the reader.

pub mod config;
pub mod db;
pub mod epub;
pub mod error;
pub mod ingest;
pub mod routes;
pub mod state;
pub mod storage;
