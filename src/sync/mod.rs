//! JSONL sync files.
//!
//! A local, git-friendly snapshot of the content collection:
//!
//! - **Export**: every syncable record → `content.jsonl`, then mark synced
//! - **Import**: `content.jsonl` → [`ContentStore::merge`](crate::content::ContentStore::merge)
//!   per record
//! - **Status**: unsynced counts and export file statistics
//!
//! # File Format
//!
//! One record per line with a `type` tag and the record nested under `data`:
//! ```json
//! {"type":"content","data":{"id":"c1","noteId":"n1","type":"tiptap",...},"content_hash":"abc","exported_at":"2025-01-20T10:00:00Z"}
//! ```

mod export;
mod file;
mod import;
mod status;
mod types;

pub use export::{CONTENT_FILE, Exporter, default_export_dir};
pub use file::{
    atomic_write, count_lines, ensure_gitignore, file_size, gitignore_content, read_jsonl,
    write_jsonl,
};
pub use import::Importer;
pub use status::{get_sync_status, print_status};
pub use types::{
    ContentRecord, EntityStats, ExportFileInfo, ExportStats, ImportStats, SyncError, SyncRecord,
    SyncResult, SyncStatus,
};
