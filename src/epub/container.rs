//! Zip container access for EPUB archives
//!
//! Entries are decompressed on demand, one entry per read; the archive
//! bytes stay borrowed from the caller and are never copied.

use std::borrow::Cow;
use std::io::{Cursor, Read};

use zip::result::ZipError;
use zip::ZipArchive;

use super::EpubError;

/// Fixed path of the container pointer inside every EPUB
pub const CONTAINER_POINTER: &str = "META-INF/container.xml";

/// How far into an entry to look for an XML encoding declaration
const DECLARATION_SNIFF_LEN: usize = 256;

/// Largest decompressed size accepted for a single entry
pub const DEFAULT_MAX_ENTRY_BYTES: u64 = 256 * 1024 * 1024;

/// Upper bound on buffer pre-allocation. Declared sizes come from the
/// archive and are not trusted.
const PREALLOC_LIMIT: u64 = 1024 * 1024;

/// An opened EPUB zip archive
pub struct Container<'a> {
    archive: ZipArchive<Cursor<&'a [u8]>>,
    max_entry_bytes: u64,
}

impl<'a> Container<'a> {
    /// Open a zip archive held in memory
    pub fn open(bytes: &'a [u8]) -> Result<Self, EpubError> {
        let archive = ZipArchive::new(Cursor::new(bytes))?;
        Ok(Self {
            archive,
            max_entry_bytes: DEFAULT_MAX_ENTRY_BYTES,
        })
    }

    /// Set the largest decompressed size accepted for a single entry
    pub fn with_entry_limit(mut self, max_entry_bytes: u64) -> Self {
        self.max_entry_bytes = max_entry_bytes;
        self
    }

    /// Number of entries in the archive
    pub fn len(&self) -> usize {
        self.archive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archive.len() == 0
    }

    /// Names of all entries, in archive order
    pub fn entry_names(&self) -> Vec<String> {
        self.archive.file_names().map(|s| s.to_string()).collect()
    }

    /// Whether an entry exists at `path`
    pub fn contains(&self, path: &str) -> bool {
        self.lookup_name(path).is_some()
    }

    /// Read an entry's raw (decompressed) bytes
    pub fn read(&mut self, path: &str) -> Result<Vec<u8>, EpubError> {
        let name = self
            .lookup_name(path)
            .ok_or_else(|| EpubError::EntryNotFound(path.to_string()))?;

        let mut file = match self.archive.by_name(&name) {
            Ok(file) => file,
            Err(ZipError::FileNotFound) => return Err(EpubError::EntryNotFound(name)),
            Err(e) => return Err(EpubError::InvalidArchive(e)),
        };

        let limit = self.max_entry_bytes;
        let mut data = Vec::with_capacity(file.size().min(PREALLOC_LIMIT).min(limit) as usize);
        file.by_ref()
            .take(limit.saturating_add(1))
            .read_to_end(&mut data)
            .map_err(|source| EpubError::EntryRead {
                path: name.clone(),
                source,
            })?;

        if data.len() as u64 > limit {
            return Err(EpubError::EntryRead {
                path: name,
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("entry exceeds {} bytes", limit),
                ),
            });
        }

        Ok(data)
    }

    /// Read an entry and decode it as text.
    ///
    /// `hint` is an encoding label to try when the bytes are not valid
    /// UTF-8; without one, the entry's own XML declaration is consulted.
    pub fn read_text(&mut self, path: &str, hint: Option<&str>) -> Result<String, EpubError> {
        let bytes = self.read(path)?;
        let declared = match hint {
            Some(label) => Some(label.to_string()),
            None => declared_encoding(&bytes),
        };
        Ok(decode_text(&bytes, declared.as_deref()).into_owned())
    }

    /// Map a requested path to the archive's actual entry name.
    ///
    /// Tries the exact name, then the percent-decoded form.
    fn lookup_name(&self, path: &str) -> Option<String> {
        let path = path.trim_start_matches('/');
        if self.archive.index_for_name(path).is_some() {
            return Some(path.to_string());
        }

        let decoded = urlencoding::decode(path).ok()?;
        if decoded != path && self.archive.index_for_name(&decoded).is_some() {
            return Some(decoded.into_owned());
        }

        None
    }
}

/// Decode bytes to a string.
///
/// UTF-8 first (BOM handled by encoding_rs), then the hinted encoding,
/// then Windows-1252, which accepts every byte sequence.
pub fn decode_text<'b>(bytes: &'b [u8], hint: Option<&str>) -> Cow<'b, str> {
    let (result, _encoding, malformed) = encoding_rs::UTF_8.decode(bytes);
    if !malformed {
        return result;
    }

    if let Some(encoding) = hint.and_then(|label| encoding_rs::Encoding::for_label(label.as_bytes())) {
        let (result, _, _) = encoding.decode(bytes);
        return result;
    }

    let (result, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    result
}

/// Pull the `encoding="..."` label out of an XML declaration, if present
fn declared_encoding(bytes: &[u8]) -> Option<String> {
    let head = &bytes[..bytes.len().min(DECLARATION_SNIFF_LEN)];
    let head = String::from_utf8_lossy(head);
    let decl_end = head.find("?>")?;
    let decl = &head[..decl_end];
    if !decl.trim_start_matches('\u{feff}').trim_start().starts_with("<?xml") {
        return None;
    }

    let rest = &decl[decl.find("encoding")? + "encoding".len()..];
    let rest = rest.trim_start().strip_prefix('=')?.trim_start();
    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let value = &rest[1..];
    let end = value.find(quote)?;
    Some(value[..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epub::fixtures::zip_entries;

    #[test]
    fn test_open_rejects_non_zip() {
        let result = Container::open(b"definitely not a zip file");
        assert!(matches!(result, Err(EpubError::InvalidArchive(_))));
    }

    #[test]
    fn test_read_and_missing_entry() {
        let bytes = zip_entries(&[("mimetype", b"application/epub+zip".as_slice())]);
        let mut container = Container::open(&bytes).unwrap();

        assert_eq!(container.len(), 1);
        assert!(container.contains("mimetype"));
        assert_eq!(container.read("mimetype").unwrap(), b"application/epub+zip");
        assert!(matches!(
            container.read("OEBPS/missing.xhtml"),
            Err(EpubError::EntryNotFound(p)) if p == "OEBPS/missing.xhtml"
        ));
    }

    #[test]
    fn test_entry_over_limit_is_rejected() {
        let bytes = zip_entries(&[("big.xhtml", [b'a'; 64].as_slice()), ("small.txt", b"ok".as_slice())]);
        let mut container = Container::open(&bytes).unwrap().with_entry_limit(16);

        assert!(matches!(
            container.read("big.xhtml"),
            Err(EpubError::EntryRead { path, .. }) if path == "big.xhtml"
        ));
        assert_eq!(container.read("small.txt").unwrap(), b"ok");
    }

    #[test]
    fn test_declared_size_is_not_trusted() {
        let mut bytes = zip_entries(&[("META-INF/container.xml", b"<container/>".as_slice())]);

        // Claim a ~4 GiB uncompressed size in the central directory entry
        let central = bytes
            .windows(4)
            .position(|w| w == b"PK\x01\x02")
            .unwrap();
        bytes[central + 24..central + 28].copy_from_slice(&0xFFFF_FFFEu32.to_le_bytes());

        let mut container = Container::open(&bytes).unwrap();
        assert_eq!(container.read(CONTAINER_POINTER).unwrap(), b"<container/>");
    }

    #[test]
    fn test_read_percent_encoded_path() {
        let bytes = zip_entries(&[("OEBPS/chapter one.xhtml", b"<p>hi</p>".as_slice())]);
        let mut container = Container::open(&bytes).unwrap();

        let text = container.read_text("OEBPS/chapter%20one.xhtml", None).unwrap();
        assert_eq!(text, "<p>hi</p>");
    }

    #[test]
    fn test_read_text_strips_bom() {
        let bytes = zip_entries(&[("a.txt", b"\xEF\xBB\xBFhello".as_slice())]);
        let mut container = Container::open(&bytes).unwrap();
        assert_eq!(container.read_text("a.txt", None).unwrap(), "hello");
    }

    #[test]
    fn test_read_text_uses_declared_encoding() {
        // "café" in ISO-8859-1 is not valid UTF-8
        let body: &[u8] = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><p>caf\xE9</p>";
        let bytes = zip_entries(&[("c.xhtml", body)]);
        let mut container = Container::open(&bytes).unwrap();

        let text = container.read_text("c.xhtml", None).unwrap();
        assert!(text.ends_with("<p>café</p>"));
    }

    #[test]
    fn test_declared_encoding() {
        assert_eq!(
            declared_encoding(b"<?xml version='1.0' encoding='windows-1251'?><a/>"),
            Some("windows-1251".to_string())
        );
        assert_eq!(declared_encoding(b"<?xml version=\"1.0\"?><a/>"), None);
        assert_eq!(declared_encoding(b"<html></html>"), None);
    }

    #[test]
    fn test_decode_text_falls_back_to_windows_1252() {
        let text = decode_text(b"\x93quoted\x94", None);
        assert_eq!(text, "\u{201c}quoted\u{201d}");
    }
}
