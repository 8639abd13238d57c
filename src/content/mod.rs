//! The content store.
//!
//! [`ContentStore`] owns the canonical body of every note. On write it
//! decides between plaintext and ciphertext, pulls inline media out into
//! the attachment store and keeps the note's attachment relations in step
//! with the body. On read it can put media back for rendering. Remote
//! records go through [`ContentStore::merge`] instead of [`ContentStore::add`].
//!
//! Collaborators are injected as `Arc`s; the store holds no ambient state.
//! Writes to the same content id must be serialized by the caller.

mod extract;
mod media;
mod merge;

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::codec::CodecRegistry;
use crate::error::{Error, Result};
use crate::model::content::new_content_id;
use crate::model::{Body, ContentItem, ContentPatch, EMPTY_BODY, MetadataUpdate, StoredBody};
use crate::storage::SqliteStorage;
use crate::storage::traits::{AttachmentBridge, HistorySink, KeyedCollection, RelationIndex};

pub use extract::Extraction;
pub use merge::{DEFAULT_CONFLICT_THRESHOLD_MS, MergeOutcome, MergeStrategy};

/// A tolerated failure that did not abort the enclosing write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PartialFailure {
    /// An inline blob could not be saved and was left in the body.
    AttachmentNotSaved { mime_type: String, reason: String },
    /// The body references a hash with no attachment record; no relation was made.
    AttachmentMissing { hash: String },
    /// The history snapshot for an editing session was not written.
    HistoryNotRecorded { session_id: String, reason: String },
}

impl fmt::Display for PartialFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AttachmentNotSaved { mime_type, reason } => {
                write!(f, "attachment ({mime_type}) not saved: {reason}")
            }
            Self::AttachmentMissing { hash } => write!(f, "attachment {hash} not found"),
            Self::HistoryNotRecorded { session_id, reason } => {
                write!(f, "history for session {session_id} not recorded: {reason}")
            }
        }
    }
}

/// Outcome of a write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteReport {
    /// Id of the written record.
    pub id: String,
    pub partial_failures: Vec<PartialFailure>,
}

/// Content store over injected collaborators.
pub struct ContentStore<C, A, R, H> {
    collection: Arc<C>,
    attachments: Arc<A>,
    relations: Arc<R>,
    history: Arc<H>,
    codecs: CodecRegistry,
    strategy: MergeStrategy,
    conflict_threshold_ms: i64,
}

/// A store wired entirely to one SQLite database.
pub type LocalContentStore = ContentStore<SqliteStorage, SqliteStorage, SqliteStorage, SqliteStorage>;

impl LocalContentStore {
    /// Wire every collaborator to `storage`, with the built-in codecs.
    #[must_use]
    pub fn local(storage: Arc<SqliteStorage>) -> Self {
        Self::new(
            Arc::clone(&storage),
            Arc::clone(&storage),
            Arc::clone(&storage),
            storage,
            CodecRegistry::with_defaults(),
        )
    }
}

impl<C, A, R, H> ContentStore<C, A, R, H>
where
    C: KeyedCollection,
    A: AttachmentBridge,
    R: RelationIndex,
    H: HistorySink,
{
    #[must_use]
    pub fn new(
        collection: Arc<C>,
        attachments: Arc<A>,
        relations: Arc<R>,
        history: Arc<H>,
        codecs: CodecRegistry,
    ) -> Self {
        Self {
            collection,
            attachments,
            relations,
            history,
            codecs,
            strategy: MergeStrategy::default(),
            conflict_threshold_ms: DEFAULT_CONFLICT_THRESHOLD_MS,
        }
    }

    #[must_use]
    pub fn with_merge_strategy(mut self, strategy: MergeStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Edits further apart than this are treated as divergent during merge.
    #[must_use]
    pub fn with_conflict_threshold(mut self, millis: i64) -> Self {
        self.conflict_threshold_ms = millis;
        self
    }

    #[must_use]
    pub fn merge_strategy(&self) -> MergeStrategy {
        self.strategy
    }

    /// Write content and return its id.
    ///
    /// Partial failures are logged; use [`add_with_report`](Self::add_with_report)
    /// to inspect them.
    ///
    /// # Errors
    ///
    /// Returns `InvalidUsage` for remote records, `MissingOwner` when no note
    /// id can be resolved, or a storage error.
    pub async fn add(&self, patch: ContentPatch) -> Result<String> {
        let report = self.add_with_report(patch).await?;
        for failure in &report.partial_failures {
            warn!(id = %report.id, %failure, "Content written with partial failure");
        }
        Ok(report.id)
    }

    /// Write content and report tolerated failures.
    ///
    /// # Errors
    ///
    /// Same as [`add`](Self::add).
    pub async fn add_with_report(&self, patch: ContentPatch) -> Result<WriteReport> {
        if patch.remote {
            return Err(Error::InvalidUsage(
                "remote content must go through merge, not add".to_string(),
            ));
        }

        let ContentPatch {
            id,
            note_id,
            content_type,
            data,
            local_only,
            date_created,
            date_edited,
            conflicted,
            date_resolved,
            session_id,
            remote: _,
        } = patch;

        let incoming = data.and_then(Body::classify);
        match &incoming {
            Some(Body::Malformed(raw)) => {
                warn!(payload = %raw, "Malformed content body, storing placeholder");
            }
            Some(Body::Unusable(raw)) => {
                warn!(payload = %raw, "Unusable content body, keeping previous body");
            }
            _ => {}
        }

        let prior = match &id {
            Some(id) => self.get(id).await?,
            None => None,
        };
        let id = id.unwrap_or_else(new_content_id);

        let note_id = prior
            .as_ref()
            .map(|p| p.note_id.clone())
            .or(note_id.filter(|n| !n.is_empty()))
            .ok_or(Error::MissingOwner)?;

        // A cipher always wins; plaintext never overwrites an encrypted body.
        let data = match (incoming, prior.as_ref().map(|p| &p.data)) {
            (Some(Body::Cipher(cipher)), _) => StoredBody::Cipher(cipher),
            (_, Some(StoredBody::Cipher(cipher))) => StoredBody::Cipher(cipher.clone()),
            (Some(Body::Plaintext(text)), _) => StoredBody::Plaintext(text),
            (Some(Body::Malformed(raw)), _) => StoredBody::Plaintext(Body::placeholder(&raw)),
            (None | Some(Body::Unusable(_)), Some(StoredBody::Plaintext(text))) => {
                StoredBody::Plaintext(text.clone())
            }
            (None | Some(Body::Unusable(_)), None) => StoredBody::Plaintext(EMPTY_BODY.to_string()),
        };

        let now = chrono::Utc::now().timestamp_millis();
        let item = ContentItem {
            id,
            note_id,
            content_type: content_type
                .or_else(|| prior.as_ref().map(|p| p.content_type))
                .unwrap_or_default(),
            data,
            local_only: local_only.unwrap_or(false) || prior.as_ref().is_some_and(|p| p.local_only),
            date_created: date_created
                .or_else(|| prior.as_ref().map(|p| p.date_created))
                .unwrap_or(now),
            date_edited: date_edited
                .or_else(|| prior.as_ref().map(|p| p.date_edited))
                .unwrap_or(now),
            date_modified: now,
            conflicted: conflicted.or_else(|| prior.as_ref().and_then(|p| p.conflicted.clone())),
            date_resolved: date_resolved.or_else(|| prior.as_ref().and_then(|p| p.date_resolved)),
            deleted: false,
            synced: false,
        };

        let mut partial_failures = Vec::new();
        let item = if item.locked() {
            item
        } else {
            let extraction = self.extract_attachments(item).await?;
            partial_failures.extend(extraction.partial_failures);
            extraction.item
        };

        self.collection.upsert(&item).await?;
        info!(id = %item.id, note_id = %item.note_id, locked = item.locked(), "Content written");

        if let Some(session_id) = session_id {
            if let Err(e) = self.history.add(&session_id, &item).await {
                partial_failures.push(PartialFailure::HistoryNotRecorded {
                    session_id,
                    reason: e.to_string(),
                });
            }
        }

        Ok(WriteReport {
            id: item.id,
            partial_failures,
        })
    }

    /// Get live content by id. Tombstones read as `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection lookup fails.
    pub async fn get(&self, id: &str) -> Result<Option<ContentItem>> {
        Ok(self.collection.get(id).await?.filter(|item| !item.deleted))
    }

    /// Tombstone content by id. Returns the number of records tombstoned.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection write fails.
    pub async fn remove(&self, ids: &[String]) -> Result<usize> {
        let count = self.collection.soft_delete(ids).await?;
        debug!(requested = ids.len(), count, "Removed content");
        Ok(count)
    }

    /// Tombstone the content of the given notes.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection write fails.
    pub async fn remove_by_note_id(&self, note_ids: &[String]) -> Result<usize> {
        let count = self.collection.soft_delete_by_note(note_ids).await?;
        debug!(requested = note_ids.len(), count, "Removed content by note");
        Ok(count)
    }

    /// Whether live content exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection lookup fails.
    pub async fn exists(&self, id: &str) -> Result<bool> {
        self.collection.exists(id).await
    }

    /// Metadata-only update of the content owned by the given notes.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection write fails.
    pub async fn update_by_note_id(
        &self,
        update: &MetadataUpdate,
        note_ids: &[String],
    ) -> Result<usize> {
        self.collection.update_by_note(note_ids, update).await
    }

    /// Every record, tombstones included.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection read fails.
    pub async fn all_for_sync(&self) -> Result<Vec<ContentItem>> {
        self.collection.all().await
    }

    /// Flag records as exported.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection write fails.
    pub async fn mark_synced(&self, ids: &[String]) -> Result<usize> {
        self.collection.mark_synced(ids).await
    }
}

impl<C, A, R, H> fmt::Debug for ContentStore<C, A, R, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentStore")
            .field("codecs", &self.codecs)
            .field("strategy", &self.strategy)
            .field("conflict_threshold_ms", &self.conflict_threshold_ms)
            .finish_non_exhaustive()
    }
}
