//! Note history storage.
//!
//! Each editing session keeps one snapshot of the content it last wrote, so
//! repeated saves within a session overwrite instead of piling up.

use crate::error::Result;
use crate::model::{ContentItem, ContentType, StoredBody};
use crate::storage::sqlite::SqliteStorage;
use crate::storage::traits::HistorySink;

/// A stored history snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub session_id: String,
    pub note_id: String,
    pub content_id: String,
    pub content_type: ContentType,
    pub data: StoredBody,
    pub date_created: i64,
    pub date_modified: i64,
}

impl SqliteStorage {
    /// Record the latest state of a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the body cannot be encoded or the write fails.
    pub fn record_history(&self, session_id: &str, item: &ContentItem) -> Result<()> {
        let data = item.data.to_column()?;
        let now = chrono::Utc::now().timestamp_millis();

        self.mutate("record_history", |tx| {
            tx.execute(
                "INSERT INTO note_history (session_id, note_id, content_id, type, locked, data, date_created, date_modified)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
                 ON CONFLICT(session_id) DO UPDATE SET
                    type = excluded.type,
                    locked = excluded.locked,
                    data = excluded.data,
                    date_modified = excluded.date_modified",
                rusqlite::params![
                    session_id,
                    item.note_id,
                    item.id,
                    item.content_type.as_str(),
                    item.locked(),
                    data,
                    now
                ],
            )?;
            Ok(())
        })
    }

    /// History of a note, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row cannot be decoded.
    pub fn get_history(&self, note_id: &str, limit: Option<u32>) -> Result<Vec<HistoryEntry>> {
        let limit = limit.unwrap_or(100);
        let rows: Vec<(String, String, String, String, bool, String, i64, i64)> =
            self.with_conn(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT session_id, note_id, content_id, type, locked, data, date_created, date_modified
                     FROM note_history
                     WHERE note_id = ?1
                     ORDER BY date_modified DESC
                     LIMIT ?2",
                )?;
                let rows = stmt.query_map(rusqlite::params![note_id, limit], |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                        row.get(7)?,
                    ))
                })?;
                Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
            })?;

        rows.into_iter()
            .map(
                |(session_id, note_id, content_id, type_str, locked, data, created, modified)| {
                    Ok(HistoryEntry {
                        session_id,
                        note_id,
                        content_id,
                        content_type: ContentType::parse(&type_str).unwrap_or_default(),
                        data: StoredBody::from_column(locked, data)?,
                        date_created: created,
                        date_modified: modified,
                    })
                },
            )
            .collect()
    }
}

impl HistorySink for SqliteStorage {
    async fn add(&self, session_id: &str, item: &ContentItem) -> Result<()> {
        self.record_history(session_id, item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_snapshot_is_overwritten() {
        let storage = SqliteStorage::open_memory().unwrap();
        let mut item = ContentItem::empty("n1");

        storage.record_history("s1", &item).unwrap();
        item.data = StoredBody::Plaintext("<p>second</p>".into());
        storage.record_history("s1", &item).unwrap();
        storage.record_history("s2", &item).unwrap();

        let history = storage.get_history("n1", Some(10)).unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|h| h.data == item.data));
        assert!(storage.get_history("other", None).unwrap().is_empty());
    }
}
