//! Sync types for JSONL export/import.
//!
//! Each line of an export file is one [`SyncRecord`]. The record keeps the
//! content under `data` rather than flattening it, since content carries its
//! own `type` field.

use serde::{Deserialize, Serialize};

use crate::content::MergeOutcome;
use crate::model::ContentItem;

/// Tagged union for JSONL records.
///
/// The serde tag produces lines like `{"type":"content","data":{...},...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncRecord {
    /// A content record, tombstones included.
    Content(ContentRecord),
}

impl SyncRecord {
    /// ID of the wrapped record.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Content(rec) => &rec.data.id,
        }
    }
}

/// Content with sync metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRecord {
    /// The content record as stored.
    pub data: ContentItem,
    /// SHA256 hash of the serialized data (for change detection).
    pub content_hash: String,
    /// ISO8601 timestamp when this record was exported.
    pub exported_at: String,
}

/// Statistics for an export operation.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ExportStats {
    /// Live content records written.
    pub content: usize,
    /// Tombstones written.
    pub tombstones: usize,
    /// Local-only records left out of the export.
    pub local_only_skipped: usize,
}

impl ExportStats {
    /// Total number of records written.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.content + self.tombstones
    }

    /// Returns true if nothing was exported.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Statistics for an import operation.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ImportStats {
    /// Statistics for content records.
    pub content: EntityStats,
}

impl ImportStats {
    /// Total number of records processed.
    #[must_use]
    pub const fn total_processed(&self) -> usize {
        self.content.total()
    }

    /// Fold another file's statistics into this one.
    pub fn absorb(&mut self, other: &Self) {
        self.content.absorb(&other.content);
    }
}

/// Per-entity statistics for import operations.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct EntityStats {
    /// Number of new records created.
    pub created: usize,
    /// Number of existing records updated.
    pub updated: usize,
    /// Number of remote tombstones applied.
    pub deleted: usize,
    /// Number of records skipped (no change or merge strategy chose local).
    pub skipped: usize,
    /// Number of conflicts encountered.
    pub conflicts: usize,
}

impl EntityStats {
    /// Total records processed.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.created + self.updated + self.deleted + self.skipped + self.conflicts
    }

    /// Count one merge result.
    pub fn record(&mut self, outcome: MergeOutcome) {
        match outcome {
            MergeOutcome::Created => self.created += 1,
            MergeOutcome::Updated => self.updated += 1,
            MergeOutcome::Deleted => self.deleted += 1,
            MergeOutcome::Skipped => self.skipped += 1,
            MergeOutcome::Conflicted => self.conflicts += 1,
        }
    }

    fn absorb(&mut self, other: &Self) {
        self.created += other.created;
        self.updated += other.updated;
        self.deleted += other.deleted;
        self.skipped += other.skipped;
        self.conflicts += other.conflicts;
    }
}

/// Sync status information.
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    /// Records with local changes not yet exported (local-only excluded).
    pub unsynced: usize,
    /// Live records.
    pub live: usize,
    /// Tombstones kept for sync.
    pub tombstones: usize,
    /// Records holding an unresolved remote copy.
    pub conflicted: usize,
    /// Records that never leave this machine.
    pub local_only: usize,
    /// Directory the export files live in.
    pub export_dir: String,
    /// Whether any export files exist.
    pub has_export_files: bool,
    /// List of export files with their sizes.
    pub export_files: Vec<ExportFileInfo>,
}

/// Information about an export file.
#[derive(Debug, Clone, Serialize)]
pub struct ExportFileInfo {
    /// File name (e.g., "content.jsonl").
    pub name: String,
    /// File size in bytes.
    pub size: u64,
    /// Number of lines (records) in the file.
    pub line_count: usize,
}

/// Sync-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// No records to export.
    #[error("No content to export")]
    NothingToExport,

    /// JSONL file not found.
    #[error("JSONL file not found: {0}")]
    FileNotFound(String),

    /// Invalid record format.
    #[error("Invalid record at line {line}: {message}")]
    InvalidRecord {
        /// Line number (1-indexed).
        line: usize,
        /// Error message.
        message: String,
    },

    /// Export would drop records that only exist in the file.
    #[error("Export would lose {count} record(s) that exist in JSONL but not in database: {preview}")]
    WouldLoseRecords {
        /// Number of records missing from the database.
        count: usize,
        /// First few missing IDs.
        preview: String,
    },
}

impl From<rusqlite::Error> for SyncError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<crate::error::Error> for SyncError {
    fn from(err: crate::error::Error) -> Self {
        match err {
            crate::error::Error::Sync(inner) => inner,
            crate::error::Error::Io(inner) => Self::Io(inner),
            crate::error::Error::Json(inner) => Self::Json(inner),
            other => Self::Database(other.to_string()),
        }
    }
}

/// Result type for sync operations.
pub type SyncResult<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_stats() {
        let mut stats = ExportStats::default();
        assert!(stats.is_empty());

        stats.content = 5;
        stats.tombstones = 3;
        stats.local_only_skipped = 2;
        assert_eq!(stats.total(), 8);
        assert!(!stats.is_empty());
    }

    #[test]
    fn test_entity_stats_records_outcomes() {
        let mut stats = EntityStats::default();
        for outcome in [
            MergeOutcome::Created,
            MergeOutcome::Created,
            MergeOutcome::Updated,
            MergeOutcome::Deleted,
            MergeOutcome::Skipped,
            MergeOutcome::Conflicted,
        ] {
            stats.record(outcome);
        }
        assert_eq!(stats.created, 2);
        assert_eq!(stats.conflicts, 1);
        assert_eq!(stats.total(), 6);
    }

    #[test]
    fn test_record_nests_content_under_data() {
        let mut item = ContentItem::empty("n1");
        item.id = "c1".into();
        let record = SyncRecord::Content(ContentRecord {
            data: item,
            content_hash: "abc".into(),
            exported_at: "2025-01-20T00:00:00Z".into(),
        });

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "content");
        assert_eq!(json["data"]["type"], "tiptap");
        assert_eq!(json["data"]["noteId"], "n1");

        let back: SyncRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back.id(), "c1");
    }
}
