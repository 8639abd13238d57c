//! Collaborator interfaces consumed by the content store.
//!
//! The store only talks to persistence through these traits, so it can run
//! against the bundled SQLite implementation or against test doubles.
//! Methods are async; implementations must not hold locks across an await.

use std::future::Future;

use crate::error::Result;
use crate::model::{
    Attachment, AttachmentData, ContentItem, DownloadOptions, DownloadRequest, InlineMedia,
    ItemReference, ItemType, MetadataUpdate, OutputEncoding,
};

/// Row persistence for content records.
pub trait KeyedCollection: Send + Sync {
    /// Raw lookup. Tombstones are returned.
    fn get(&self, id: &str) -> impl Future<Output = Result<Option<ContentItem>>> + Send;

    /// Insert or replace by id.
    fn upsert(&self, item: &ContentItem) -> impl Future<Output = Result<()>> + Send;

    /// Tombstone records by id. Returns the number of rows tombstoned.
    fn soft_delete(&self, ids: &[String]) -> impl Future<Output = Result<usize>> + Send;

    /// Tombstone the records owned by the given notes.
    fn soft_delete_by_note(&self, note_ids: &[String])
    -> impl Future<Output = Result<usize>> + Send;

    /// Whether a live (non-tombstoned) record exists.
    fn exists(&self, id: &str) -> impl Future<Output = Result<bool>> + Send;

    /// Metadata-only update for live records owned by the given notes.
    fn update_by_note(
        &self,
        note_ids: &[String],
        update: &MetadataUpdate,
    ) -> impl Future<Output = Result<usize>> + Send;

    /// Every record, tombstones included, ordered by id.
    fn all(&self) -> impl Future<Output = Result<Vec<ContentItem>>> + Send;

    /// Flag records as exported.
    fn mark_synced(&self, ids: &[String]) -> impl Future<Output = Result<usize>> + Send;
}

/// Content-addressed binary storage.
pub trait AttachmentBridge: Send + Sync {
    /// Persist a blob and return its hash. Saving the same bytes twice is a no-op.
    fn save(&self, media: &InlineMedia) -> impl Future<Output = Result<String>> + Send;

    /// Read a blob back. `None` when the bytes are not available locally.
    fn read(
        &self,
        hash: &str,
        encoding: OutputEncoding,
    ) -> impl Future<Output = Result<Option<AttachmentData>>> + Send;

    /// Enqueue remote downloads for a group of files.
    fn queue_downloads(
        &self,
        files: &[DownloadRequest],
        group_id: &str,
        options: Option<DownloadOptions>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Metadata lookup by hash.
    fn attachment(&self, hash: &str) -> impl Future<Output = Result<Option<Attachment>>> + Send;
}

/// Graph of links between items.
///
/// Attachment references carry the attachment hash as their id.
pub trait RelationIndex: Send + Sync {
    /// Items of `target_type` linked from `from`.
    fn resolve(
        &self,
        from: &ItemReference,
        target_type: ItemType,
    ) -> impl Future<Output = Result<Vec<ItemReference>>> + Send;

    /// Link two items. Linking twice is a no-op.
    fn add(&self, from: &ItemReference, to: &ItemReference)
    -> impl Future<Output = Result<()>> + Send;

    /// Remove a link. Unknown links are ignored.
    fn unlink(
        &self,
        from: &ItemReference,
        to: &ItemReference,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Per-session snapshots of written content.
pub trait HistorySink: Send + Sync {
    fn add(&self, session_id: &str, item: &ContentItem) -> impl Future<Output = Result<()>> + Send;
}
