//! Relation storage.
//!
//! Directed links between items, e.g. note -> attachment.

use tracing::debug;

use crate::error::Result;
use crate::model::{ItemReference, ItemType};
use crate::storage::sqlite::SqliteStorage;
use crate::storage::traits::RelationIndex;

impl SqliteStorage {
    /// Items of `target_type` linked from `from`, oldest link first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn related(&self, from: &ItemReference, target_type: ItemType) -> Result<Vec<ItemReference>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT to_id FROM relations
                 WHERE from_type = ?1 AND from_id = ?2 AND to_type = ?3
                 ORDER BY date_created, to_id",
            )?;
            let rows = stmt.query_map(
                rusqlite::params![from.item_type.as_str(), from.id, target_type.as_str()],
                |row| {
                    Ok(ItemReference {
                        item_type: target_type,
                        id: row.get(0)?,
                    })
                },
            )?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    /// Link two items.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn link(&self, from: &ItemReference, to: &ItemReference) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        self.mutate("link", |tx| {
            tx.execute(
                "INSERT OR IGNORE INTO relations (from_type, from_id, to_type, to_id, date_created)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    from.item_type.as_str(),
                    from.id,
                    to.item_type.as_str(),
                    to.id,
                    now
                ],
            )?;
            Ok(())
        })
    }

    /// Remove a link.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn unlink_items(&self, from: &ItemReference, to: &ItemReference) -> Result<()> {
        self.mutate("unlink", |tx| {
            tx.execute(
                "DELETE FROM relations
                 WHERE from_type = ?1 AND from_id = ?2 AND to_type = ?3 AND to_id = ?4",
                rusqlite::params![from.item_type.as_str(), from.id, to.item_type.as_str(), to.id],
            )?;
            Ok(())
        })
    }

    /// Notes linking to an attachment.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn notes_referencing(&self, hash: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT from_id FROM relations
                 WHERE to_type = 'attachment' AND to_id = ?1 AND from_type = 'note'
                 ORDER BY from_id",
            )?;
            let rows = stmt.query_map([hash], |row| row.get(0))?;
            Ok(rows.collect::<rusqlite::Result<Vec<String>>>()?)
        })
    }
}

impl RelationIndex for SqliteStorage {
    async fn resolve(&self, from: &ItemReference, target_type: ItemType) -> Result<Vec<ItemReference>> {
        self.related(from, target_type)
    }

    async fn add(&self, from: &ItemReference, to: &ItemReference) -> Result<()> {
        debug!(from = %from.id, to = %to.id, "Linking");
        self.link(from, to)
    }

    async fn unlink(&self, from: &ItemReference, to: &ItemReference) -> Result<()> {
        debug!(from = %from.id, to = %to.id, "Unlinking");
        self.unlink_items(from, to)
    }
}
