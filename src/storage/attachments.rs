//! Content-addressed attachment storage.
//!
//! Blobs are keyed by the SHA-256 of their bytes. A row may exist without
//! bytes when the attachment is known from sync but has not been downloaded
//! to this device yet.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rusqlite::{OptionalExtension, Row};
use tracing::{debug, warn};

use crate::error::Result;
use crate::hash::bytes_hash;
use crate::model::attachment::DEFAULT_CHUNK_SIZE;
use crate::model::{
    Attachment, AttachmentData, DownloadOptions, DownloadRequest, InlineMedia, OutputEncoding,
};
use crate::storage::sqlite::SqliteStorage;
use crate::storage::traits::AttachmentBridge;

const ATTACHMENT_COLUMNS: &str =
    "id, hash, mime_type, filename, size, chunk_size, date_created, data IS NOT NULL";

/// A queued download, as stored.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct QueuedDownload {
    pub group_id: String,
    pub filename: String,
    pub chunk_size: u64,
    pub read_on_download: Option<bool>,
    pub queued_at: i64,
}

impl SqliteStorage {
    /// Save a blob and return its hash.
    ///
    /// Saving bytes that are already stored is a no-op. Saving bytes for a
    /// hash known only by metadata fills in the bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn save_attachment(&self, media: &InlineMedia) -> Result<String> {
        let hash = bytes_hash(&media.bytes);
        let id = uuid::Uuid::new_v4().simple().to_string();
        let now = chrono::Utc::now().timestamp_millis();

        self.mutate("save_attachment", |tx| {
            tx.execute(
                "INSERT INTO attachments (id, hash, mime_type, filename, size, chunk_size, data, date_created)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(hash) DO UPDATE SET data = COALESCE(attachments.data, excluded.data)",
                rusqlite::params![
                    id,
                    hash,
                    media.mime_type,
                    media.filename,
                    media.bytes.len(),
                    DEFAULT_CHUNK_SIZE,
                    media.bytes,
                    now
                ],
            )?;
            Ok(())
        })?;

        debug!(hash = %hash, mime_type = %media.mime_type, size = media.bytes.len(), "Saved attachment");
        Ok(hash)
    }

    /// Record attachment metadata without bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn register_attachment(&self, attachment: &Attachment) -> Result<()> {
        self.mutate("register_attachment", |tx| {
            tx.execute(
                "INSERT OR IGNORE INTO attachments (id, hash, mime_type, filename, size, chunk_size, date_created)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    attachment.id,
                    attachment.hash,
                    attachment.mime_type,
                    attachment.filename,
                    attachment.size,
                    attachment.chunk_size,
                    attachment.date_created
                ],
            )?;
            Ok(())
        })
    }

    /// Look up attachment metadata by hash.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_attachment(&self, hash: &str) -> Result<Option<Attachment>> {
        self.with_conn(|conn| {
            let attachment = conn
                .query_row(
                    &format!("SELECT {ATTACHMENT_COLUMNS} FROM attachments WHERE hash = ?1"),
                    [hash],
                    map_attachment_row,
                )
                .optional()?;
            Ok(attachment)
        })
    }

    /// List all attachments, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_attachments(&self) -> Result<Vec<Attachment>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ATTACHMENT_COLUMNS} FROM attachments ORDER BY date_created DESC, hash"
            ))?;
            let rows = stmt.query_map([], map_attachment_row)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    /// Read attachment bytes in the requested encoding.
    ///
    /// Returns `None` when the bytes are not on this device, or when text was
    /// requested and the bytes are not UTF-8.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn read_attachment(
        &self,
        hash: &str,
        encoding: OutputEncoding,
    ) -> Result<Option<AttachmentData>> {
        let row: Option<(String, Option<Vec<u8>>)> = self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT mime_type, data FROM attachments WHERE hash = ?1",
                    [hash],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?)
        })?;

        let Some((mime_type, Some(bytes))) = row else {
            return Ok(None);
        };

        let data = match encoding {
            OutputEncoding::Base64 => Some(AttachmentData::DataUrl(format!(
                "data:{mime_type};base64,{}",
                STANDARD.encode(&bytes)
            ))),
            OutputEncoding::Text => match String::from_utf8(bytes) {
                Ok(text) => Some(AttachmentData::Text(text)),
                Err(_) => {
                    warn!(hash, "Attachment is not valid UTF-8, cannot read as text");
                    None
                }
            },
            OutputEncoding::Bytes => Some(AttachmentData::Bytes(bytes)),
        };
        Ok(data)
    }

    /// Enqueue downloads. Files already queued for the group are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn enqueue_downloads(
        &self,
        files: &[DownloadRequest],
        group_id: &str,
        options: Option<DownloadOptions>,
    ) -> Result<usize> {
        let now = chrono::Utc::now().timestamp_millis();
        let read_on_download = options.map(|o| o.read_on_download);

        self.mutate("enqueue_downloads", |tx| {
            let mut count = 0;
            for file in files {
                count += tx.execute(
                    "INSERT OR IGNORE INTO download_queue (group_id, filename, chunk_size, read_on_download, queued_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    rusqlite::params![group_id, file.filename, file.chunk_size, read_on_download, now],
                )?;
            }
            Ok(count)
        })
    }

    /// Downloads queued for a group, in filename order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn queued_downloads(&self, group_id: &str) -> Result<Vec<QueuedDownload>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT group_id, filename, chunk_size, read_on_download, queued_at
                 FROM download_queue WHERE group_id = ?1 ORDER BY filename",
            )?;
            let rows = stmt.query_map([group_id], |row| {
                Ok(QueuedDownload {
                    group_id: row.get(0)?,
                    filename: row.get(1)?,
                    chunk_size: row.get(2)?,
                    read_on_download: row.get(3)?,
                    queued_at: row.get(4)?,
                })
            })?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }
}

fn map_attachment_row(row: &Row<'_>) -> rusqlite::Result<Attachment> {
    Ok(Attachment {
        id: row.get(0)?,
        hash: row.get(1)?,
        mime_type: row.get(2)?,
        filename: row.get(3)?,
        size: row.get(4)?,
        chunk_size: row.get(5)?,
        date_created: row.get(6)?,
        local: row.get(7)?,
    })
}

impl AttachmentBridge for SqliteStorage {
    async fn save(&self, media: &InlineMedia) -> Result<String> {
        self.save_attachment(media)
    }

    async fn read(&self, hash: &str, encoding: OutputEncoding) -> Result<Option<AttachmentData>> {
        self.read_attachment(hash, encoding)
    }

    async fn queue_downloads(
        &self,
        files: &[DownloadRequest],
        group_id: &str,
        options: Option<DownloadOptions>,
    ) -> Result<()> {
        let queued = self.enqueue_downloads(files, group_id, options)?;
        debug!(group_id, queued, "Queued downloads");
        Ok(())
    }

    async fn attachment(&self, hash: &str) -> Result<Option<Attachment>> {
        self.get_attachment(hash)
    }
}
