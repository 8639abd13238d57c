//! Content codecs.
//!
//! A codec understands one body format well enough to find media references
//! in it and rewrite them. The store never parses bodies itself; it looks up
//! the codec for a record's [`ContentType`] in a [`CodecRegistry`] and treats
//! records without a codec as opaque.
//!
//! Extraction is split in two so codecs stay synchronous: the store asks for
//! [`inline_media`](ContentCodec::inline_media), saves the blobs through the
//! attachment bridge, then hands the resulting `source -> hash` map back to
//! [`extract_attachments`](ContentCodec::extract_attachments).

mod html;
mod tiptap;

use std::collections::HashMap;

use crate::model::{ContentType, InlineMedia};

pub use tiptap::TiptapCodec;

/// A body after extraction, with every hash it now references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub data: String,
    pub hashes: Vec<String>,
}

/// Format-specific parser and rewriter for document bodies.
pub trait ContentCodec: Send + Sync {
    /// The format this codec handles.
    fn content_type(&self) -> ContentType;

    /// Inline blobs that still need to be saved, deduplicated by source.
    fn inline_media(&self, body: &str) -> Vec<InlineMedia>;

    /// Replace saved blobs (`source -> hash`) with hash references.
    ///
    /// Blobs missing from `saved` stay inline. Transient sources on elements
    /// that already carry a hash are dropped.
    fn extract_attachments(&self, body: &str, saved: &HashMap<String, String>) -> Extracted;

    /// Every attachment hash referenced by the body, in document order.
    fn media_hashes(&self, body: &str) -> Vec<String>;

    /// Fill hash references with renderable data (`hash -> source`).
    fn insert_media(&self, body: &str, sources: &HashMap<String, String>) -> String;

    /// Drop the elements referencing any of `hashes`.
    fn remove_attachments(&self, body: &str, hashes: &[String]) -> String;
}

/// Lookup table from format to codec.
pub struct CodecRegistry {
    codecs: HashMap<ContentType, Box<dyn ContentCodec>>,
}

impl CodecRegistry {
    /// An empty registry: every body is opaque.
    #[must_use]
    pub fn new() -> Self {
        Self {
            codecs: HashMap::new(),
        }
    }

    /// Registry with every built-in codec.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(TiptapCodec::new());
        registry
    }

    /// Add or replace the codec for its format.
    pub fn register<C: ContentCodec + 'static>(&mut self, codec: C) {
        self.codecs.insert(codec.content_type(), Box::new(codec));
    }

    #[must_use]
    pub fn get(&self, content_type: ContentType) -> Option<&dyn ContentCodec> {
        self.codecs.get(&content_type).map(Box::as_ref)
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("formats", &self.codecs.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lookup() {
        let registry = CodecRegistry::with_defaults();
        assert!(registry.get(ContentType::Tiptap).is_some());
        assert!(CodecRegistry::new().get(ContentType::Tiptap).is_none());
    }
}
