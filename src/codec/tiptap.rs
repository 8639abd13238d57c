//! Codec for editor HTML bodies.
//!
//! Media references in a tiptap body are element attributes:
//! - `<img src="data:image/png;base64,...">` is an inline blob that still
//!   has to be saved;
//! - any element with `data-hash="<sha256>"` references a saved attachment
//!   (images, and `<span class="attachment">` file chips).
//!
//! Saved images keep only `data-hash` in storage. `src` is filled in
//! transiently by [`insert_media`](ContentCodec::insert_media) for rendering and
//! stripped again on the next extraction.

use std::collections::{HashMap, HashSet};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::debug;

use super::html::{StartTag, for_each_tag, remove_elements, rewrite_tags};
use super::{ContentCodec, Extracted};
use crate::model::{ContentType, InlineMedia};

const HASH_ATTR: &str = "data-hash";
const SRC_ATTR: &str = "src";
const FILENAME_ATTR: &str = "data-filename";

/// The HTML codec.
#[derive(Debug, Default, Clone, Copy)]
pub struct TiptapCodec;

impl TiptapCodec {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ContentCodec for TiptapCodec {
    fn content_type(&self) -> ContentType {
        ContentType::Tiptap
    }

    fn inline_media(&self, body: &str) -> Vec<InlineMedia> {
        let mut seen = HashSet::new();
        let mut media = Vec::new();

        for_each_tag(body, |tag| {
            if tag.name != "img" || tag.get(HASH_ATTR).is_some() {
                return;
            }
            let Some(source) = tag.get(SRC_ATTR) else {
                return;
            };
            if !seen.insert(source.to_string()) {
                return;
            }
            match decode_data_url(source) {
                Some((mime_type, bytes)) => media.push(InlineMedia {
                    source: source.to_string(),
                    mime_type,
                    filename: tag.get(FILENAME_ATTR).map(str::to_string),
                    bytes,
                }),
                None => debug!("Skipping image that is not an inline base64 blob"),
            }
        });

        media
    }

    fn extract_attachments(&self, body: &str, saved: &HashMap<String, String>) -> Extracted {
        let data = rewrite_tags(body, |tag| {
            if tag.name != "img" {
                return false;
            }
            if tag.get(HASH_ATTR).is_some() {
                return tag.remove(SRC_ATTR);
            }
            let Some(hash) = tag.get(SRC_ATTR).and_then(|src| saved.get(src)).cloned() else {
                return false;
            };
            tag.set(HASH_ATTR, &hash);
            tag.remove(SRC_ATTR);
            true
        });
        let hashes = self.media_hashes(&data);
        Extracted { data, hashes }
    }

    fn media_hashes(&self, body: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut hashes = Vec::new();
        for_each_tag(body, |tag| {
            if let Some(hash) = tag.get(HASH_ATTR).filter(|h| !h.is_empty()) {
                if seen.insert(hash.to_string()) {
                    hashes.push(hash.to_string());
                }
            }
        });
        hashes
    }

    fn insert_media(&self, body: &str, sources: &HashMap<String, String>) -> String {
        rewrite_tags(body, |tag| {
            if tag.name != "img" {
                return false;
            }
            match tag.get(HASH_ATTR).and_then(|hash| sources.get(hash)).cloned() {
                Some(source) => {
                    tag.set(SRC_ATTR, &source);
                    true
                }
                None => false,
            }
        })
    }

    fn remove_attachments(&self, body: &str, hashes: &[String]) -> String {
        remove_elements(body, |tag: &StartTag| {
            tag.get(HASH_ATTR)
                .is_some_and(|hash| hashes.iter().any(|h| h == hash))
        })
    }
}

/// Split a `data:<mime>;base64,<payload>` URL into mime type and bytes.
fn decode_data_url(source: &str) -> Option<(String, Vec<u8>)> {
    let rest = source.strip_prefix("data:")?;
    let (meta, payload) = rest.split_once(',')?;
    let mut parts = meta.split(';');
    let mime_type = parts
        .next()
        .filter(|m| !m.is_empty())
        .unwrap_or("application/octet-stream")
        .to_ascii_lowercase();
    if !parts.any(|p| p.eq_ignore_ascii_case("base64")) {
        return None;
    }
    let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(cleaned)
        .ok()
        .map(|bytes| (mime_type, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    // "hello" in base64
    const PNG_URL: &str = "data:image/png;base64,aGVsbG8=";

    #[test]
    fn test_inline_media_finds_unsaved_images_once() {
        let body = format!(
            r#"<p>a</p><img src="{PNG_URL}"><img src="{PNG_URL}"><img src="https://x/y.png"><img data-hash="h" src="{PNG_URL}">"#
        );
        let media = TiptapCodec.inline_media(&body);
        assert_eq!(media.len(), 1);
        assert_eq!(media[0].mime_type, "image/png");
        assert_eq!(media[0].bytes, b"hello");
    }

    #[test]
    fn test_extract_replaces_saved_sources_with_hash() {
        let body = format!(r#"<p>a</p><img alt="x" src="{PNG_URL}">"#);
        let saved = HashMap::from([(PNG_URL.to_string(), "h1".to_string())]);
        let out = TiptapCodec.extract_attachments(&body, &saved);
        assert_eq!(out.data, r#"<p>a</p><img alt="x" data-hash="h1">"#);
        assert_eq!(out.hashes, vec!["h1".to_string()]);
    }

    #[test]
    fn test_extract_is_idempotent() {
        let body = format!(r#"<img src="{PNG_URL}"><span class="attachment" data-hash="f1">doc.pdf</span>"#);
        let saved = HashMap::from([(PNG_URL.to_string(), "h1".to_string())]);
        let first = TiptapCodec.extract_attachments(&body, &saved);
        let second = TiptapCodec.extract_attachments(&first.data, &HashMap::new());
        assert_eq!(first.data, second.data);
        assert_eq!(first.hashes, vec!["h1".to_string(), "f1".to_string()]);
        assert_eq!(first.hashes, second.hashes);
    }

    #[test]
    fn test_extract_strips_rendered_sources() {
        let body = format!(r#"<img data-hash="h1" src="{PNG_URL}">"#);
        let out = TiptapCodec.extract_attachments(&body, &HashMap::new());
        assert_eq!(out.data, r#"<img data-hash="h1">"#);
    }

    #[test]
    fn test_unsaved_blob_stays_inline() {
        let body = format!(r#"<img src="{PNG_URL}">"#);
        let out = TiptapCodec.extract_attachments(&body, &HashMap::new());
        assert_eq!(out.data, body);
        assert!(out.hashes.is_empty());
    }

    #[test]
    fn test_insert_media_fills_known_hashes() {
        let body = r#"<img data-hash="h1"><img data-hash="h2">"#;
        let sources = HashMap::from([("h1".to_string(), "data:image/png;base64,AA==".to_string())]);
        let out = TiptapCodec.insert_media(body, &sources);
        assert_eq!(
            out,
            r#"<img data-hash="h1" src="data:image/png;base64,AA=="><img data-hash="h2">"#
        );
    }

    #[test]
    fn test_remove_attachments() {
        let body = r#"<p>keep</p><img data-hash="h1"><span class="attachment" data-hash="f1">a.pdf</span><img data-hash="h2">"#;
        let out = TiptapCodec.remove_attachments(body, &["h1".to_string(), "f1".to_string()]);
        assert_eq!(out, r#"<p>keep</p><img data-hash="h2">"#);
    }

    #[test]
    fn test_decode_data_url_requires_base64() {
        assert!(decode_data_url("data:text/plain,hello").is_none());
        assert!(decode_data_url("https://example.com/a.png").is_none());
        assert_eq!(
            decode_data_url("data:image/gif;base64,aGk=").map(|(m, b)| (m, b)),
            Some(("image/gif".to_string(), b"hi".to_vec()))
        );
    }
}
