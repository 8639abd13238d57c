//! SQLite storage implementation.
//!
//! This module provides the storage backend for Folio using SQLite. One
//! [`SqliteStorage`] implements every collaborator trait the content store
//! consumes; the content table lives here, attachments, relations and
//! history live in sibling modules.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, Transaction};
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{ContentItem, ContentType, MetadataUpdate, StoredBody};
use crate::storage::schema::apply_schema;
use crate::storage::traits::KeyedCollection;

/// Column list shared by every content query. Order matches [`map_content_row`].
pub(crate) const CONTENT_COLUMNS: &str = "id, note_id, type, locked, data, local_only, date_created, \
     date_edited, date_modified, conflicted, date_resolved, deleted, synced";

/// SQLite-based storage backend.
///
/// The connection sits behind a mutex so the storage can be shared as an
/// `Arc` across async tasks. The lock is only held for the duration of one
/// synchronous statement group.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

/// Counts of content records, for status output.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ContentCounts {
    /// Live records.
    pub live: usize,
    /// Tombstones.
    pub deleted: usize,
    /// Records changed since the last export.
    pub unsynced: usize,
    /// Records carrying a conflicted remote copy.
    pub conflicted: usize,
    /// Records that never leave this device.
    pub local_only: usize,
}

impl ContentCounts {
    /// Returns total number of records.
    #[must_use]
    pub fn total(&self) -> usize {
        self.live + self.deleted
    }
}

impl SqliteStorage {
    /// Open a database at the given path.
    ///
    /// Creates the database and applies schema if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a database with an optional busy timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open_with_timeout(path: &Path, timeout_ms: Option<u64>) -> Result<Self> {
        let conn = Connection::open(path)?;

        // Default 5 second timeout
        let timeout = timeout_ms.map_or(Duration::from_secs(5), Duration::from_millis);
        conn.busy_timeout(timeout)?;

        apply_schema(&conn)?;
        debug!(path = %path.display(), "Opened database");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Other("database connection lock poisoned".to_string()))
    }

    /// Run a read against the connection.
    ///
    /// # Errors
    ///
    /// Returns whatever `f` returns, or an error if the lock is poisoned.
    pub fn with_conn<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R>,
    {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Execute a mutation inside an IMMEDIATE transaction.
    ///
    /// Commits when `f` succeeds; the transaction is rolled back on drop
    /// otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails.
    pub fn mutate<F, R>(&self, op: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction) -> Result<R>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        let result = f(&tx)?;
        tx.commit()?;
        debug!(op, "Committed mutation");
        Ok(result)
    }

    // ==================
    // Content Operations
    // ==================

    /// Get a content record by ID, tombstones included.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the row cannot be decoded.
    pub fn get_content(&self, id: &str) -> Result<Option<ContentItem>> {
        self.with_conn(|conn| {
            let item = conn
                .query_row(
                    &format!("SELECT {CONTENT_COLUMNS} FROM content WHERE id = ?1"),
                    [id],
                    map_content_row,
                )
                .optional()?;
            Ok(item)
        })
    }

    /// Get the live content record of a note.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the row cannot be decoded.
    pub fn content_for_note(&self, note_id: &str) -> Result<Option<ContentItem>> {
        self.with_conn(|conn| {
            let item = conn
                .query_row(
                    &format!(
                        "SELECT {CONTENT_COLUMNS} FROM content
                         WHERE note_id = ?1 AND deleted = 0
                         ORDER BY date_modified DESC LIMIT 1"
                    ),
                    [note_id],
                    map_content_row,
                )
                .optional()?;
            Ok(item)
        })
    }

    /// Insert or replace a content record.
    ///
    /// # Errors
    ///
    /// Returns an error if the body cannot be encoded or the write fails.
    pub fn upsert_content(&self, item: &ContentItem) -> Result<()> {
        let data = item.data.to_column()?;
        let conflicted = item
            .conflicted
            .as_deref()
            .map(serde_json::to_string)
            .transpose()?;

        self.mutate("upsert_content", |tx| {
            tx.execute(
                "INSERT INTO content (id, note_id, type, locked, data, local_only, date_created,
                                      date_edited, date_modified, conflicted, date_resolved, deleted, synced)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                 ON CONFLICT(id) DO UPDATE SET
                    note_id = excluded.note_id,
                    type = excluded.type,
                    locked = excluded.locked,
                    data = excluded.data,
                    local_only = excluded.local_only,
                    date_created = excluded.date_created,
                    date_edited = excluded.date_edited,
                    date_modified = excluded.date_modified,
                    conflicted = excluded.conflicted,
                    date_resolved = excluded.date_resolved,
                    deleted = excluded.deleted,
                    synced = excluded.synced",
                rusqlite::params![
                    item.id,
                    item.note_id,
                    item.content_type.as_str(),
                    item.locked(),
                    data,
                    item.local_only,
                    item.date_created,
                    item.date_edited,
                    item.date_modified,
                    conflicted,
                    item.date_resolved,
                    item.deleted,
                    item.synced,
                ],
            )?;
            Ok(())
        })
    }

    /// Tombstone records by id.
    ///
    /// The body is cleared to empty plaintext; id, owner and dates stay.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub fn soft_delete_content(&self, ids: &[String]) -> Result<usize> {
        let now = chrono::Utc::now().timestamp_millis();
        self.mutate("soft_delete_content", |tx| {
            let mut count = 0;
            for id in ids {
                count += tx.execute(
                    "UPDATE content
                     SET deleted = 1, locked = 0, data = '', conflicted = NULL,
                         date_modified = ?1, synced = 0
                     WHERE id = ?2 AND deleted = 0",
                    rusqlite::params![now, id],
                )?;
            }
            Ok(count)
        })
    }

    /// Tombstone every live record owned by the given notes.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub fn soft_delete_content_by_note(&self, note_ids: &[String]) -> Result<usize> {
        let now = chrono::Utc::now().timestamp_millis();
        self.mutate("soft_delete_content_by_note", |tx| {
            let mut count = 0;
            for note_id in note_ids {
                count += tx.execute(
                    "UPDATE content
                     SET deleted = 1, locked = 0, data = '', conflicted = NULL,
                         date_modified = ?1, synced = 0
                     WHERE note_id = ?2 AND deleted = 0",
                    rusqlite::params![now, note_id],
                )?;
            }
            Ok(count)
        })
    }

    /// Whether a live record exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn content_exists(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            Ok(conn
                .prepare("SELECT 1 FROM content WHERE id = ?1 AND deleted = 0")?
                .exists([id])?)
        })
    }

    /// Apply a metadata update to the live records of the given notes.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub fn update_content_by_note(
        &self,
        note_ids: &[String],
        update: &MetadataUpdate,
    ) -> Result<usize> {
        let now = chrono::Utc::now().timestamp_millis();
        self.mutate("update_content_by_note", |tx| {
            let mut count = 0;
            for note_id in note_ids {
                count += tx.execute(
                    "UPDATE content
                     SET local_only = COALESCE(?1, local_only),
                         date_resolved = COALESCE(?2, date_resolved),
                         conflicted = CASE WHEN ?3 THEN NULL ELSE conflicted END,
                         date_modified = ?4,
                         synced = 0
                     WHERE note_id = ?5 AND deleted = 0",
                    rusqlite::params![
                        update.local_only,
                        update.date_resolved,
                        update.clear_conflict,
                        now,
                        note_id
                    ],
                )?;
            }
            Ok(count)
        })
    }

    /// Every record, tombstones included, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn all_content(&self) -> Result<Vec<ContentItem>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {CONTENT_COLUMNS} FROM content ORDER BY id"))?;
            let rows = stmt.query_map([], map_content_row)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    /// Flag records as exported.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub fn mark_content_synced(&self, ids: &[String]) -> Result<usize> {
        self.mutate("mark_content_synced", |tx| {
            let mut count = 0;
            for id in ids {
                count += tx.execute(
                    "UPDATE content SET synced = 1 WHERE id = ?1 AND synced = 0",
                    [id],
                )?;
            }
            Ok(count)
        })
    }

    /// Summary counts over the content table.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn content_counts(&self) -> Result<ContentCounts> {
        self.with_conn(|conn| {
            let counts = conn.query_row(
                "SELECT
                    COALESCE(SUM(CASE WHEN deleted = 0 THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN deleted = 1 THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN synced = 0 AND local_only = 0 THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN conflicted IS NOT NULL THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN local_only = 1 THEN 1 ELSE 0 END), 0)
                 FROM content",
                [],
                |row| {
                    Ok(ContentCounts {
                        live: count_column(row, 0)?,
                        deleted: count_column(row, 1)?,
                        unsynced: count_column(row, 2)?,
                        conflicted: count_column(row, 3)?,
                        local_only: count_column(row, 4)?,
                    })
                },
            )?;
            Ok(counts)
        })
    }
}

fn count_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<usize> {
    let value: i64 = row.get(idx)?;
    usize::try_from(value).map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(e)))
}

/// Map a row selected with [`CONTENT_COLUMNS`] to a record.
pub(crate) fn map_content_row(row: &Row<'_>) -> rusqlite::Result<ContentItem> {
    let type_str: String = row.get(2)?;
    let content_type = ContentType::parse(&type_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            Type::Text,
            format!("unknown content type: {type_str}").into(),
        )
    })?;

    let locked: bool = row.get(3)?;
    let data = StoredBody::from_column(locked, row.get(4)?)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;

    let conflicted = row
        .get::<_, Option<String>>(9)?
        .map(|json| serde_json::from_str::<ContentItem>(&json))
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(9, Type::Text, Box::new(e)))?
        .map(Box::new);

    Ok(ContentItem {
        id: row.get(0)?,
        note_id: row.get(1)?,
        content_type,
        data,
        local_only: row.get(5)?,
        date_created: row.get(6)?,
        date_edited: row.get(7)?,
        date_modified: row.get(8)?,
        conflicted,
        date_resolved: row.get(10)?,
        deleted: row.get(11)?,
        synced: row.get(12)?,
    })
}

impl KeyedCollection for SqliteStorage {
    async fn get(&self, id: &str) -> Result<Option<ContentItem>> {
        self.get_content(id)
    }

    async fn upsert(&self, item: &ContentItem) -> Result<()> {
        self.upsert_content(item)
    }

    async fn soft_delete(&self, ids: &[String]) -> Result<usize> {
        self.soft_delete_content(ids)
    }

    async fn soft_delete_by_note(&self, note_ids: &[String]) -> Result<usize> {
        self.soft_delete_content_by_note(note_ids)
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        self.content_exists(id)
    }

    async fn update_by_note(&self, note_ids: &[String], update: &MetadataUpdate) -> Result<usize> {
        self.update_content_by_note(note_ids, update)
    }

    async fn all(&self) -> Result<Vec<ContentItem>> {
        self.all_content()
    }

    async fn mark_synced(&self, ids: &[String]) -> Result<usize> {
        self.mark_content_synced(ids)
    }
}
