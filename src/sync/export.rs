//! JSONL export.
//!
//! # Snapshot Mode
//!
//! The export file holds the current state of every syncable record,
//! tombstones included. It is rewritten on each export and git tracks the
//! history. Local-only records never leave the machine.
//!
//! # Safety Checks
//!
//! Before overwriting, the exporter checks for records that would be "lost"
//! (in the file but not in the database). Use `force` to override.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::info;

use crate::content::ContentStore;
use crate::hash::content_hash;
use crate::storage::traits::{AttachmentBridge, HistorySink, KeyedCollection, RelationIndex};
use crate::sync::file::{ensure_gitignore, read_jsonl, write_jsonl};
use crate::sync::types::{ContentRecord, ExportStats, SyncError, SyncRecord, SyncResult};

/// File name of the content snapshot.
pub const CONTENT_FILE: &str = "content.jsonl";

/// Writes the content snapshot for one store.
pub struct Exporter<'a, C, A, R, H> {
    store: &'a ContentStore<C, A, R, H>,
    output_dir: PathBuf,
}

impl<'a, C, A, R, H> Exporter<'a, C, A, R, H>
where
    C: KeyedCollection,
    A: AttachmentBridge,
    R: RelationIndex,
    H: HistorySink,
{
    #[must_use]
    pub const fn new(store: &'a ContentStore<C, A, R, H>, output_dir: PathBuf) -> Self {
        Self { store, output_dir }
    }

    /// Get the output directory.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Export all syncable records and mark them synced.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - there is nothing to export
    /// - the safety check fails and `force` is false
    /// - reading the store or writing the file fails
    pub async fn export(&self, force: bool) -> SyncResult<ExportStats> {
        let mut stats = ExportStats::default();
        let mut items = Vec::new();
        for item in self.store.all_for_sync().await? {
            if item.local_only {
                stats.local_only_skipped += 1;
            } else {
                items.push(item);
            }
        }

        if items.is_empty() {
            return Err(SyncError::NothingToExport);
        }

        let path = self.output_dir.join(CONTENT_FILE);
        if !force {
            let ids: HashSet<String> = items.iter().map(|i| i.id.clone()).collect();
            check_for_lost_records(&path, &ids)?;
        }

        ensure_gitignore(&self.output_dir)?;

        let now = Utc::now().to_rfc3339();
        let mut unsynced = Vec::new();
        let records: Vec<SyncRecord> = items
            .into_iter()
            .map(|item| {
                if item.deleted {
                    stats.tombstones += 1;
                } else {
                    stats.content += 1;
                }
                if !item.synced {
                    unsynced.push(item.id.clone());
                }
                SyncRecord::Content(ContentRecord {
                    content_hash: content_hash(&item),
                    data: item,
                    exported_at: now.clone(),
                })
            })
            .collect();

        write_jsonl(&path, &records)?;
        self.store.mark_synced(&unsynced).await?;

        info!(
            path = %path.display(),
            content = stats.content,
            tombstones = stats.tombstones,
            newly_synced = unsynced.len(),
            "Exported content snapshot"
        );
        Ok(stats)
    }
}

/// Fail if the file holds records the database does not know about.
fn check_for_lost_records(path: &Path, db_ids: &HashSet<String>) -> SyncResult<()> {
    if !path.exists() {
        return Ok(());
    }

    let existing = read_jsonl(path)?;
    let mut missing: Vec<String> = existing
        .iter()
        .map(SyncRecord::id)
        .filter(|id| !db_ids.contains(*id))
        .map(str::to_string)
        .collect();

    if missing.is_empty() {
        return Ok(());
    }

    missing.sort();
    let mut preview = missing.iter().take(5).cloned().collect::<Vec<_>>().join(", ");
    if missing.len() > 5 {
        preview.push_str(&format!(" ... and {} more", missing.len() - 5));
    }

    Err(SyncError::WouldLoseRecords {
        count: missing.len(),
        preview,
    })
}

/// Default export directory: `sync/` next to the database file.
#[must_use]
pub fn default_export_dir(db_path: &Path) -> PathBuf {
    db_path
        .parent()
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
        .join("sync")
}
