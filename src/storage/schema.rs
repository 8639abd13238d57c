//! Database schema definitions.
//!
//! The complete SQLite schema for Folio. Everything uses `IF NOT EXISTS`, so
//! the script is applied on every open.

use rusqlite::{Connection, Result};

/// Current schema version for migration tracking.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// The complete SQL schema for the Folio database.
///
/// Timestamps are stored as INTEGER (Unix milliseconds).
pub const SCHEMA_SQL: &str = r"
-- ====================
-- Schema Version Tracking
-- ====================

CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at INTEGER NOT NULL
);

-- ====================
-- Content
-- ====================

-- One row per note body. `data` holds plaintext verbatim, or the cipher
-- object as JSON when `locked` is set.
CREATE TABLE IF NOT EXISTS content (
    id TEXT PRIMARY KEY,
    note_id TEXT NOT NULL,
    type TEXT NOT NULL DEFAULT 'tiptap',
    locked INTEGER NOT NULL DEFAULT 0,
    data TEXT NOT NULL,
    local_only INTEGER NOT NULL DEFAULT 0,
    date_created INTEGER NOT NULL,
    date_edited INTEGER NOT NULL,
    date_modified INTEGER NOT NULL,
    conflicted TEXT,
    date_resolved INTEGER,
    deleted INTEGER NOT NULL DEFAULT 0,
    synced INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_content_note ON content(note_id);
CREATE INDEX IF NOT EXISTS idx_content_synced ON content(synced, date_modified);

-- ====================
-- Attachments
-- ====================

-- Content-addressed blobs. `data` is NULL until the bytes are on this device.
CREATE TABLE IF NOT EXISTS attachments (
    id TEXT PRIMARY KEY,
    hash TEXT NOT NULL UNIQUE,
    mime_type TEXT NOT NULL,
    filename TEXT,
    size INTEGER NOT NULL DEFAULT 0,
    chunk_size INTEGER NOT NULL,
    data BLOB,
    date_created INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS download_queue (
    group_id TEXT NOT NULL,
    filename TEXT NOT NULL,
    chunk_size INTEGER NOT NULL,
    read_on_download INTEGER,
    queued_at INTEGER NOT NULL,
    PRIMARY KEY (group_id, filename)
);

-- ====================
-- Relations
-- ====================

CREATE TABLE IF NOT EXISTS relations (
    from_type TEXT NOT NULL,
    from_id TEXT NOT NULL,
    to_type TEXT NOT NULL,
    to_id TEXT NOT NULL,
    date_created INTEGER NOT NULL,
    PRIMARY KEY (from_type, from_id, to_type, to_id)
);

CREATE INDEX IF NOT EXISTS idx_relations_to ON relations(to_type, to_id);

-- ====================
-- History
-- ====================

-- Latest snapshot per editing session.
CREATE TABLE IF NOT EXISTS note_history (
    session_id TEXT PRIMARY KEY,
    note_id TEXT NOT NULL,
    content_id TEXT NOT NULL,
    type TEXT NOT NULL,
    locked INTEGER NOT NULL,
    data TEXT NOT NULL,
    date_created INTEGER NOT NULL,
    date_modified INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_note_history_note ON note_history(note_id, date_modified DESC);
";

/// Apply the schema to the database.
///
/// This uses `execute_batch` to run the entire DDL script.
/// It is idempotent because all statements use `IF NOT EXISTS`.
///
/// # Errors
///
/// Returns an error if the SQL execution fails or pragmas cannot be set.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "cache_size", "-64000")?; // 64MB cache
    conn.pragma_update(None, "temp_store", "MEMORY")?;

    conn.execute_batch(SCHEMA_SQL)?;

    // Run migrations for existing databases
    super::migrations::run_migrations(conn)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
        rusqlite::params![
            format!("v{CURRENT_SCHEMA_VERSION}"),
            chrono::Utc::now().timestamp_millis()
        ],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_schema() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).expect("Failed to apply schema");

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        for table in [
            "content",
            "attachments",
            "download_queue",
            "relations",
            "note_history",
            "schema_migrations",
        ] {
            assert!(tables.contains(&table.to_string()), "missing {table}");
        }
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        apply_schema(&conn).expect("First apply failed");
        apply_schema(&conn).expect("Second apply failed");
    }

    #[test]
    fn test_attachment_hash_is_unique() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();

        let insert = "INSERT INTO attachments (id, hash, mime_type, chunk_size, date_created)
                      VALUES (?1, 'h1', 'image/png', 1, 0)";
        assert!(conn.execute(insert, ["a1"]).is_ok());
        assert!(conn.execute(insert, ["a2"]).is_err());
    }
}
