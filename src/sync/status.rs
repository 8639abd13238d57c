//! Sync status display.

use std::path::Path;

use colored::Colorize;

use crate::storage::SqliteStorage;
use crate::sync::export::CONTENT_FILE;
use crate::sync::file::{count_lines, file_size};
use crate::sync::types::{ExportFileInfo, SyncResult, SyncStatus};

/// Known export file names.
const EXPORT_FILES: [&str; 1] = [CONTENT_FILE];

/// Current sync state: record counts from the database plus the export files
/// present in `export_dir`.
///
/// # Errors
///
/// Returns an error if the count query fails.
pub fn get_sync_status(storage: &SqliteStorage, export_dir: &Path) -> SyncResult<SyncStatus> {
    let counts = storage.content_counts()?;

    let mut export_files = Vec::new();
    for filename in EXPORT_FILES {
        let path = export_dir.join(filename);
        if path.exists() {
            export_files.push(ExportFileInfo {
                name: filename.to_string(),
                size: file_size(&path),
                line_count: count_lines(&path).unwrap_or(0),
            });
        }
    }

    Ok(SyncStatus {
        unsynced: counts.unsynced,
        live: counts.live,
        tombstones: counts.deleted,
        conflicted: counts.conflicted,
        local_only: counts.local_only,
        export_dir: export_dir.display().to_string(),
        has_export_files: !export_files.is_empty(),
        export_files,
    })
}

/// Print sync status to stdout in a human-readable format.
pub fn print_status(status: &SyncStatus) {
    println!("{}", "Sync Status".bold().underline());
    println!();

    let total = status.live + status.tombstones;
    if total > 0 {
        println!("{}", "Content:".blue().bold());
        println!("  Live:        {}", status.live);
        if status.tombstones > 0 {
            println!("  Tombstones:  {}", status.tombstones);
        }
        if status.local_only > 0 {
            println!("  Local-only:  {}", status.local_only);
        }
        if status.conflicted > 0 {
            println!("  {}  {}", "Conflicted:".red(), status.conflicted);
        }
        println!();
    }

    if status.unsynced > 0 {
        println!("{}", "Pending Export:".yellow().bold());
        println!("  {}: {}", "Records".bold(), status.unsynced);
        println!();
        println!("{}", "Run 'folio sync export' to export pending changes.".dimmed());
    } else if total == 0 {
        println!("{}", "No content yet.".dimmed());
    } else {
        println!("{}", "No pending changes to export.".green());
    }

    println!();

    if status.has_export_files {
        println!("{} {}", "Export Files:".blue().bold(), status.export_dir.dimmed());
        for file in &status.export_files {
            println!(
                "  {} ({}, {} records)",
                file.name,
                format_size(file.size),
                file.line_count
            );
        }
    } else {
        println!("{}", "No export files found.".dimmed());
    }
}

/// Format a byte size as a human-readable string.
#[allow(clippy::cast_precision_loss)]
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;

    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContentItem, StoredBody};
    use tempfile::TempDir;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(1024 * 1024 + 512 * 1024), "1.5 MB");
    }

    #[test]
    fn test_get_sync_status_empty() {
        let temp_dir = TempDir::new().unwrap();
        let storage = SqliteStorage::open_memory().unwrap();

        let status = get_sync_status(&storage, temp_dir.path()).unwrap();
        assert_eq!(status.unsynced, 0);
        assert_eq!(status.live, 0);
        assert!(!status.has_export_files);
        assert!(status.export_files.is_empty());
    }

    #[test]
    fn test_get_sync_status_counts_records_and_files() {
        let temp_dir = TempDir::new().unwrap();
        let storage = SqliteStorage::open_memory().unwrap();

        let mut item = ContentItem::empty("n1");
        item.local_only = false;
        item.data = StoredBody::Plaintext("<p>x</p>".into());
        storage.upsert_content(&item).unwrap();
        let mut private = ContentItem::empty("n2");
        private.id = "private".into();
        storage.upsert_content(&private).unwrap();

        std::fs::write(temp_dir.path().join(CONTENT_FILE), "{}\n{}\n").unwrap();

        let status = get_sync_status(&storage, temp_dir.path()).unwrap();
        assert_eq!(status.live, 2);
        assert_eq!(status.unsynced, 1);
        assert_eq!(status.local_only, 1);
        assert!(status.has_export_files);
        assert_eq!(status.export_files[0].name, CONTENT_FILE);
        assert_eq!(status.export_files[0].line_count, 2);
    }
}
