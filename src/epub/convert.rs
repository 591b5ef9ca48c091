//! Spine-ordered conversion of content documents to markdown

use super::container::Container;
use super::markdown::html_to_markdown;
use super::types::{ConvertedText, ManifestItem, Package};
use super::EpubError;

/// Whether a manifest item is a markup content document
pub fn is_markup(item: &ManifestItem) -> bool {
    let media_type = item.media_type.to_ascii_lowercase();
    let href = item.href.to_ascii_lowercase();
    media_type.contains("html") || href.ends_with(".html") || href.ends_with(".xhtml") || href.ends_with(".htm")
}

/// Convert every markup document in the spine, in spine order.
///
/// Never fails: an entry that cannot be read is logged and contributes
/// nothing, and so does an entry without a `<body>`.
pub fn convert(container: &mut Container<'_>, package: &Package) -> ConvertedText {
    let mut text = ConvertedText::with_header(&package.metadata);

    for idref in &package.spine {
        let Some(item) = package.manifest.get(idref) else {
            tracing::debug!(idref = %idref, "Spine references unknown manifest id, skipping");
            continue;
        };

        if !is_markup(item) {
            tracing::trace!(idref = %idref, media_type = %item.media_type, "Skipping non-markup spine item");
            continue;
        }

        match convert_entry(container, item) {
            Ok(Some(markdown)) => text.push_block(&markdown),
            Ok(None) => {
                tracing::debug!(href = %item.href, "Content document has no body, skipping");
            }
            Err(e) => {
                tracing::warn!(href = %item.href, error = %e, "Failed to convert content document");
            }
        }
    }

    text
}

fn convert_entry(container: &mut Container<'_>, item: &ManifestItem) -> Result<Option<String>, EpubError> {
    let html = container.read_text(&item.href, None)?;
    Ok(html_to_markdown(&html))
}
