//! JSONL import.
//!
//! Every record in the file goes through [`ContentStore::merge`], so imports
//! follow the store's merge strategy and conflict threshold.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::content::ContentStore;
use crate::hash::content_hash;
use crate::storage::traits::{AttachmentBridge, HistorySink, KeyedCollection, RelationIndex};
use crate::sync::export::CONTENT_FILE;
use crate::sync::file::read_jsonl;
use crate::sync::types::{ImportStats, SyncRecord, SyncResult};

/// Merges JSONL snapshots into one store.
pub struct Importer<'a, C, A, R, H> {
    store: &'a ContentStore<C, A, R, H>,
}

impl<'a, C, A, R, H> Importer<'a, C, A, R, H>
where
    C: KeyedCollection,
    A: AttachmentBridge,
    R: RelationIndex,
    H: HistorySink,
{
    #[must_use]
    pub const fn new(store: &'a ContentStore<C, A, R, H>) -> Self {
        Self { store }
    }

    /// Import records from one JSONL file.
    ///
    /// A record whose `content_hash` does not match its data was edited by
    /// hand; it is still merged, with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, a record is invalid, or a
    /// merge fails.
    pub async fn import(&self, path: &Path) -> SyncResult<ImportStats> {
        let records = read_jsonl(path)?;
        let mut stats = ImportStats::default();

        for record in records {
            match record {
                SyncRecord::Content(rec) => {
                    if content_hash(&rec.data) != rec.content_hash {
                        warn!(id = %rec.data.id, "Content hash mismatch, record was modified");
                    }
                    let id = rec.data.id.clone();
                    let outcome = self.store.merge(rec.data).await?;
                    debug!(%id, ?outcome, "Merged record");
                    stats.content.record(outcome);
                }
            }
        }

        info!(
            path = %path.display(),
            created = stats.content.created,
            updated = stats.content.updated,
            deleted = stats.content.deleted,
            skipped = stats.content.skipped,
            conflicts = stats.content.conflicts,
            "Imported content"
        );
        Ok(stats)
    }

    /// Import every known snapshot file in `dir`. Missing files are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if any present file fails to import.
    pub async fn import_all(&self, dir: &Path) -> SyncResult<ImportStats> {
        let mut total = ImportStats::default();
        let path = dir.join(CONTENT_FILE);
        if path.exists() {
            total.absorb(&self.import(&path).await?);
        } else {
            debug!(dir = %dir.display(), "No snapshot to import");
        }
        Ok(total)
    }
}
