//! In-memory EPUB fixtures for tests

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Build a zip archive from `(path, contents)` pairs
pub fn zip_entries(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut buffer = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut buffer));
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for (path, contents) in entries {
            let options = if *path == "mimetype" { stored } else { deflated };
            zip.start_file(*path, options).unwrap();
            zip.write_all(contents).unwrap();
        }
        zip.finish().unwrap();
    }
    buffer
}

/// Container pointer naming `package_path` as the rootfile
pub fn container_xml(package_path: &str) -> String {
    format!(
        r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="{package_path}" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#
    )
}

/// Wrap body markup in a minimal XHTML document
pub fn xhtml(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml">
<head><title>Chapter</title><style>p {{ margin: 0; }}</style></head>
<body>{body}</body>
</html>"#
    )
}

/// Builder for small but structurally complete EPUB archives
pub struct EpubBuilder {
    package_path: String,
    title: Option<String>,
    creator: Option<String>,
    manifest: Vec<String>,
    spine: Vec<String>,
    files: Vec<(String, Vec<u8>)>,
}

impl EpubBuilder {
    /// Start a book whose package document lives at `OEBPS/content.opf`
    pub fn new() -> Self {
        Self::with_package_path("OEBPS/content.opf")
    }

    pub fn with_package_path(package_path: &str) -> Self {
        Self {
            package_path: package_path.to_string(),
            title: Some("Test Book".to_string()),
            creator: Some("Test Author".to_string()),
            manifest: Vec::new(),
            spine: Vec::new(),
            files: Vec::new(),
        }
    }

    pub fn title(mut self, title: Option<&str>) -> Self {
        self.title = title.map(|s| s.to_string());
        self
    }

    pub fn creator(mut self, creator: Option<&str>) -> Self {
        self.creator = creator.map(|s| s.to_string());
        self
    }

    /// Declare a manifest item; `properties` is written only when given
    pub fn item(mut self, id: &str, href: &str, media_type: &str, properties: Option<&str>) -> Self {
        let props = properties
            .map(|p| format!(r#" properties="{p}""#))
            .unwrap_or_default();
        self.manifest.push(format!(
            r#"<item id="{id}" href="{href}" media-type="{media_type}"{props}/>"#
        ));
        self
    }

    /// Add a raw manifest line (for malformed items)
    pub fn raw_item(mut self, line: &str) -> Self {
        self.manifest.push(line.to_string());
        self
    }

    pub fn spine(mut self, idref: &str) -> Self {
        self.spine.push(idref.to_string());
        self
    }

    /// Add a file at an archive path
    pub fn file(mut self, path: &str, contents: impl Into<Vec<u8>>) -> Self {
        self.files.push((path.to_string(), contents.into()));
        self
    }

    /// Add an XHTML chapter file with the given body markup
    pub fn chapter(self, path: &str, body: &str) -> Self {
        self.file(path, xhtml(body))
    }

    /// The package document as it will be written
    pub fn package_document(&self) -> String {
        let title = self
            .title
            .as_ref()
            .map(|t| format!("<dc:title>{t}</dc:title>"))
            .unwrap_or_default();
        let creator = self
            .creator
            .as_ref()
            .map(|c| format!("<dc:creator>{c}</dc:creator>"))
            .unwrap_or_default();
        let spine: String = self
            .spine
            .iter()
            .map(|idref| format!(r#"<itemref idref="{idref}"/>"#))
            .collect();

        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<package version="3.0" xmlns="http://www.idpf.org/2007/opf" unique-identifier="uid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="uid">urn:uuid:0000</dc:identifier>
    {title}
    {creator}
    <dc:language>en</dc:language>
  </metadata>
  <manifest>
    {manifest}
  </manifest>
  <spine>
    {spine}
  </spine>
</package>"#,
            manifest = self.manifest.join("\n    "),
        )
    }

    pub fn build(self) -> Vec<u8> {
        let container = container_xml(&self.package_path);
        let package = self.package_document();

        let mut entries: Vec<(&str, &[u8])> = vec![
            ("mimetype", b"application/epub+zip".as_slice()),
            ("META-INF/container.xml", container.as_bytes()),
            (self.package_path.as_str(), package.as_bytes()),
        ];
        for (path, contents) in &self.files {
            entries.push((path.as_str(), contents.as_slice()));
        }

        zip_entries(&entries)
    }
}

/// The concrete two-item book used across pipeline tests: one chapter and
/// a `cover-image` tagged JPEG.
pub fn sample_epub() -> Vec<u8> {
    EpubBuilder::new()
        .title(Some("The Sample"))
        .creator(Some("Ada Writer"))
        .item("chap1", "text/ch1.xhtml", "application/xhtml+xml", None)
        .item("cover-img", "images/cover.jpg", "image/jpeg", Some("cover-image"))
        .spine("chap1")
        .chapter("OEBPS/text/ch1.xhtml", "<h1>Chapter One</h1><p>It was a dark night.</p>")
        .file("OEBPS/images/cover.jpg", b"\xFF\xD8\xFFfake-jpeg".to_vec())
        .build()
}
