//! Data models for Folio.
//!
//! This module contains all domain models:
//! - ContentItem (and the incoming Body / ContentPatch shapes)
//! - Attachment
//! - ItemReference

pub mod attachment;
pub mod content;
pub mod relation;

pub use attachment::{
    Attachment, AttachmentData, DownloadOptions, DownloadRequest, InlineMedia, OutputEncoding,
};
pub use content::{
    Body, Cipher, ContentItem, ContentPatch, ContentType, MetadataUpdate, StoredBody, EMPTY_BODY,
};
pub use relation::{ItemReference, ItemType};
