//! Package document resolution
//!
//! Reads `META-INF/container.xml` to find the package document, then
//! streams the package document to build the manifest table, the spine
//! and the book metadata.
//!
//! XML is read with quick-xml's event reader with end-name checking off,
//! so mismatched tags in real-world packages do not abort the parse.
//! Elements are matched by local name (`dc:title` and `title` both count).

use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::Reader;

use super::container::{Container, CONTAINER_POINTER};
use super::types::{BookMetadata, ManifestItem, ManifestTable, Package, UNKNOWN_AUTHOR, UNTITLED};
use super::EpubError;

/// Resolve the package document of an opened container
pub fn resolve(container: &mut Container<'_>) -> Result<Package, EpubError> {
    let pointer = match container.read_text(CONTAINER_POINTER, None) {
        Ok(text) => text,
        Err(EpubError::EntryNotFound(_)) => return Err(EpubError::MissingContainerPointer),
        Err(e) => return Err(e),
    };

    let package_path = find_package_path(&pointer)?;
    let base_dir = package_path
        .rsplit_once('/')
        .map(|(dir, _)| dir.to_string())
        .unwrap_or_default();

    let document = match container.read_text(&package_path, None) {
        Ok(text) => text,
        Err(EpubError::EntryNotFound(_)) => {
            return Err(EpubError::MissingPackageDocument(package_path))
        }
        Err(e) => return Err(e),
    };

    let parsed = parse_package_document(&document, &package_path, &base_dir)?;

    tracing::debug!(
        package = %package_path,
        manifest_items = parsed.manifest.len(),
        spine_items = parsed.spine.len(),
        cover = ?parsed.metadata.cover_path,
        "Resolved package document"
    );

    Ok(Package {
        package_path,
        base_dir,
        manifest: parsed.manifest,
        spine: parsed.spine,
        metadata: parsed.metadata,
    })
}

/// Find the `full-path` of the first `rootfile` in container.xml
fn find_package_path(xml: &str) -> Result<String, EpubError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    reader.check_end_names(false);

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"rootfile" {
                    return attribute(&e, b"full-path")
                        .map(|p| p.trim().trim_start_matches('/').to_string())
                        .filter(|p| !p.is_empty())
                        .ok_or(EpubError::MissingPackagePath);
                }
            }
            Ok(Event::Eof) => return Err(EpubError::MissingPackagePath),
            Ok(_) => {}
            Err(e) => {
                return Err(EpubError::MalformedXml {
                    path: CONTAINER_POINTER.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }
}

struct ParsedDocument {
    manifest: ManifestTable,
    spine: Vec<String>,
    metadata: BookMetadata,
}

/// Which metadata field a text capture is filling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Creator,
    Language,
    Identifier,
}

/// Text accumulated for the element currently being captured
struct Capture {
    field: Field,
    depth: usize,
    text: String,
}

#[derive(Default)]
struct Fields {
    title: Option<String>,
    creator: Option<String>,
    language: Option<String>,
    identifier: Option<String>,
}

impl Fields {
    fn slot(&mut self, field: Field) -> &mut Option<String> {
        match field {
            Field::Title => &mut self.title,
            Field::Creator => &mut self.creator,
            Field::Language => &mut self.language,
            Field::Identifier => &mut self.identifier,
        }
    }
}

fn parse_package_document(
    xml: &str,
    package_path: &str,
    base_dir: &str,
) -> Result<ParsedDocument, EpubError> {
    let mut reader = Reader::from_str(xml);
    reader.check_end_names(false);

    let mut manifest = ManifestTable::new();
    let mut spine = Vec::new();
    let mut fields = Fields::default();
    let mut cover: Option<(String, String)> = None;

    let mut seen_package = false;
    let mut in_metadata = 0usize;
    let mut in_manifest = 0usize;
    let mut in_spine = 0usize;
    let mut capture: Option<Capture> = None;

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) if seen_package => {
                tracing::warn!(
                    package = %package_path,
                    position = reader.buffer_position(),
                    error = %e,
                    "Package document is malformed, keeping what was parsed"
                );
                break;
            }
            Err(e) => {
                return Err(EpubError::MalformedXml {
                    path: package_path.to_string(),
                    reason: e.to_string(),
                })
            }
        };

        match event {
            Event::Start(e) => {
                if let Some(cap) = capture.as_mut() {
                    cap.depth += 1;
                    continue;
                }
                match e.local_name().as_ref() {
                    b"package" => seen_package = true,
                    b"metadata" => in_metadata += 1,
                    b"manifest" => in_manifest += 1,
                    b"spine" => in_spine += 1,
                    b"item" if in_manifest > 0 => {
                        handle_item(&e, base_dir, &mut manifest, &mut cover)
                    }
                    b"itemref" if in_spine > 0 => handle_itemref(&e, &mut spine),
                    name if in_metadata > 0 => {
                        if let Some(field) = metadata_field(name) {
                            if fields.slot(field).is_none() {
                                capture = Some(Capture {
                                    field,
                                    depth: 0,
                                    text: String::new(),
                                });
                            }
                        }
                    }
                    _ => {}
                }
            }
            Event::Empty(e) => {
                if capture.is_some() {
                    continue;
                }
                match e.local_name().as_ref() {
                    b"package" => seen_package = true,
                    b"item" if in_manifest > 0 => {
                        handle_item(&e, base_dir, &mut manifest, &mut cover)
                    }
                    b"itemref" if in_spine > 0 => handle_itemref(&e, &mut spine),
                    name if in_metadata > 0 => {
                        // <dc:title/> still consumes the "first element" slot
                        if let Some(field) = metadata_field(name) {
                            let slot = fields.slot(field);
                            if slot.is_none() {
                                *slot = Some(String::new());
                            }
                        }
                    }
                    _ => {}
                }
            }
            Event::End(e) => {
                if let Some(cap) = capture.as_mut() {
                    if cap.depth > 0 {
                        cap.depth -= 1;
                        continue;
                    }
                    if let Some(cap) = capture.take() {
                        *fields.slot(cap.field) = Some(cap.text);
                    }
                    continue;
                }
                match e.local_name().as_ref() {
                    b"metadata" => in_metadata = in_metadata.saturating_sub(1),
                    b"manifest" => in_manifest = in_manifest.saturating_sub(1),
                    b"spine" => in_spine = in_spine.saturating_sub(1),
                    _ => {}
                }
            }
            Event::Text(t) => {
                if let Some(cap) = capture.as_mut() {
                    cap.text.push_str(&unescape_lossy(&t));
                }
            }
            Event::CData(c) => {
                if let Some(cap) = capture.as_mut() {
                    cap.text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !seen_package {
        return Err(EpubError::MalformedXml {
            path: package_path.to_string(),
            reason: "no <package> element".to_string(),
        });
    }

    // An unterminated capture still holds usable text
    if let Some(cap) = capture.take() {
        *fields.slot(cap.field) = Some(cap.text);
    }

    let (cover_path, cover_media_type) = match cover {
        Some((path, media_type)) => (Some(path), Some(media_type)),
        None => (None, None),
    };

    let metadata = BookMetadata {
        title: non_empty(fields.title).unwrap_or_else(|| UNTITLED.to_string()),
        creator: non_empty(fields.creator).unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
        cover_path,
        cover_media_type,
        language: non_empty(fields.language),
        identifier: non_empty(fields.identifier),
    };

    Ok(ParsedDocument {
        manifest,
        spine,
        metadata,
    })
}

fn metadata_field(local_name: &[u8]) -> Option<Field> {
    match local_name {
        b"title" => Some(Field::Title),
        b"creator" => Some(Field::Creator),
        b"language" => Some(Field::Language),
        b"identifier" => Some(Field::Identifier),
        _ => None,
    }
}

fn handle_item(
    e: &BytesStart<'_>,
    base_dir: &str,
    manifest: &mut ManifestTable,
    cover: &mut Option<(String, String)>,
) {
    let (Some(id), Some(href)) = (attribute(e, b"id"), attribute(e, b"href")) else {
        tracing::debug!("Skipping manifest item without id or href");
        return;
    };

    let media_type = attribute(e, b"media-type").unwrap_or_default();
    let properties = attribute(e, b"properties").filter(|p| !p.trim().is_empty());

    let item = ManifestItem {
        href: resolve_href(base_dir, &href),
        id: id.clone(),
        media_type,
        properties,
    };

    if cover.is_none() && is_cover_candidate(&item, &href) {
        *cover = Some((item.href.clone(), item.media_type.clone()));
    }

    manifest.insert(id, item);
}

fn handle_itemref(e: &BytesStart<'_>, spine: &mut Vec<String>) {
    match attribute(e, b"idref") {
        Some(idref) if !idref.is_empty() => spine.push(idref),
        _ => tracing::debug!("Skipping spine itemref without idref"),
    }
}

/// An image whose id or declared href mentions "cover", or that carries
/// the `cover-image` property
fn is_cover_candidate(item: &ManifestItem, raw_href: &str) -> bool {
    if !item.media_type.to_ascii_lowercase().starts_with("image/") {
        return false;
    }

    item.id.to_lowercase().contains("cover")
        || raw_href.to_lowercase().contains("cover")
        || item.has_property("cover-image")
}

/// Resolve a manifest href to an archive path.
///
/// Drops any fragment, percent-decodes, joins onto the package directory
/// and collapses `.`/`..` segments. A leading `/` is archive-absolute.
pub fn resolve_href(base_dir: &str, href: &str) -> String {
    let href = href.split('#').next().unwrap_or(href);
    let decoded = urlencoding::decode(href)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| href.to_string());

    let mut segments: Vec<&str> = Vec::new();
    let joined;
    let full = if let Some(absolute) = decoded.strip_prefix('/') {
        absolute
    } else if base_dir.is_empty() {
        decoded.as_str()
    } else {
        joined = format!("{}/{}", base_dir, decoded);
        joined.as_str()
    };

    for segment in full.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    segments.join("/")
}

/// Attribute value by local name, unescaped
fn attribute(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .filter_map(|a| a.ok())
        .find(|a| a.key.local_name().as_ref() == name)
        .map(|a| match a.unescape_value() {
            Ok(v) => v.into_owned(),
            Err(_) => String::from_utf8_lossy(&a.value).into_owned(),
        })
}

fn unescape_lossy(t: &BytesText<'_>) -> String {
    match t.unescape() {
        Ok(text) => text.into_owned(),
        Err(_) => String::from_utf8_lossy(t).into_owned(),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
