//! Atomic file operations for sync.
//!
//! Export files are replaced whole: write a temp file, fsync, then rename, so
//! a crash never leaves a half-written snapshot behind.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use tracing::debug;

use crate::sync::types::{SyncError, SyncRecord, SyncResult};

/// Write content to a file atomically.
///
/// The content goes to `<path>.tmp` first, is synced to disk and then renamed
/// over the target. If any step fails, the original file (if any) remains
/// untouched.
///
/// # Errors
///
/// Returns an error if any file operation fails.
pub fn atomic_write(path: &Path, content: &str) -> SyncResult<()> {
    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = Path::new(&temp_name);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    {
        let file = File::create(temp_path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(content.as_bytes())?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }

    fs::rename(temp_path, path)?;
    debug!(path = %path.display(), bytes = content.len(), "Wrote file atomically");

    Ok(())
}

/// Write sync records to a JSONL file atomically, one record per line.
///
/// # Errors
///
/// Returns an error if a record cannot be serialized or the file cannot be
/// written.
pub fn write_jsonl(path: &Path, records: &[SyncRecord]) -> SyncResult<()> {
    let mut content = String::new();
    for record in records {
        content.push_str(&serde_json::to_string(record)?);
        content.push('\n');
    }
    atomic_write(path, &content)
}

/// Read all sync records from a JSONL file.
///
/// Blank lines are skipped. A line that does not parse fails the whole read
/// with its 1-indexed line number.
///
/// # Errors
///
/// Returns an error if the file is missing, cannot be read, or holds an
/// invalid record.
pub fn read_jsonl(path: &Path) -> SyncResult<Vec<SyncRecord>> {
    if !path.exists() {
        return Err(SyncError::FileNotFound(path.display().to_string()));
    }

    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        let record: SyncRecord =
            serde_json::from_str(&line).map_err(|e| SyncError::InvalidRecord {
                line: line_num + 1,
                message: e.to_string(),
            })?;
        records.push(record);
    }

    Ok(records)
}

/// Count the number of non-empty lines in a JSONL file.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn count_lines(path: &Path) -> SyncResult<usize> {
    if !path.exists() {
        return Ok(0);
    }

    let reader = BufReader::new(File::open(path)?);
    let mut count = 0;
    for line in reader.lines() {
        if !line?.trim().is_empty() {
            count += 1;
        }
    }
    Ok(count)
}

/// Size of a file in bytes, 0 if it doesn't exist.
#[must_use]
pub fn file_size(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// `.gitignore` for an export directory.
///
/// Whitelist: ignore everything, then let the JSONL snapshots through. The
/// database, its WAL files and temp files stay out of git.
#[must_use]
pub const fn gitignore_content() -> &'static str {
    r"# Folio sync directory
# Whitelist pattern: ignore everything except JSONL export files

*
!.gitignore
!*.jsonl
"
}

/// Create `.gitignore` in the export directory unless one exists.
///
/// An existing file is never modified.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn ensure_gitignore(export_dir: &Path) -> SyncResult<()> {
    let gitignore_path = export_dir.join(".gitignore");
    if gitignore_path.exists() {
        return Ok(());
    }

    fs::create_dir_all(export_dir)?;
    let mut file = File::create(&gitignore_path)?;
    file.write_all(gitignore_content().as_bytes())?;
    file.sync_all()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ContentItem;
    use crate::sync::types::ContentRecord;
    use tempfile::TempDir;

    fn record(id: &str) -> SyncRecord {
        let mut data = ContentItem::empty("n1");
        data.id = id.to_string();
        SyncRecord::Content(ContentRecord {
            data,
            content_hash: "abc123".to_string(),
            exported_at: "2025-01-20T00:00:00Z".to_string(),
        })
    }

    #[test]
    fn test_atomic_write_replaces_content() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.jsonl");

        atomic_write(&path, "old\n").unwrap();
        atomic_write(&path, "line 1\nline 2\n").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "line 1\nline 2\n");
        assert!(!temp_dir.path().join("test.jsonl.tmp").exists());
    }

    #[test]
    fn test_write_then_read_jsonl() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("content.jsonl");

        write_jsonl(&path, &[record("c1"), record("c2")]).unwrap();

        let records = read_jsonl(&path).unwrap();
        let ids: Vec<&str> = records.iter().map(SyncRecord::id).collect();
        assert_eq!(ids, vec!["c1", "c2"]);
        assert_eq!(count_lines(&path).unwrap(), 2);
    }

    #[test]
    fn test_invalid_line_reports_number() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("content.jsonl");
        let good = serde_json::to_string(&record("c1")).unwrap();
        fs::write(&path, format!("{good}\n\n{{\"type\":\"content\"}}\n")).unwrap();

        let err = read_jsonl(&path).unwrap_err();
        assert!(matches!(err, SyncError::InvalidRecord { line: 3, .. }));
    }

    #[test]
    fn test_missing_file() {
        let result = read_jsonl(Path::new("/nonexistent/content.jsonl"));
        assert!(matches!(result, Err(SyncError::FileNotFound(_))));
        assert_eq!(count_lines(Path::new("/nonexistent/content.jsonl")).unwrap(), 0);
        assert_eq!(file_size(Path::new("/nonexistent/content.jsonl")), 0);
    }

    #[test]
    fn test_ensure_gitignore_creates_file() {
        let temp_dir = TempDir::new().unwrap();
        ensure_gitignore(temp_dir.path()).unwrap();

        let content = fs::read_to_string(temp_dir.path().join(".gitignore")).unwrap();
        assert!(content.contains("!*.jsonl"));
        assert!(content.contains("!.gitignore"));
    }

    #[test]
    fn test_ensure_gitignore_does_not_overwrite() {
        let temp_dir = TempDir::new().unwrap();
        let gitignore_path = temp_dir.path().join(".gitignore");
        fs::write(&gitignore_path, "# Custom content\n*.tmp\n").unwrap();

        ensure_gitignore(temp_dir.path()).unwrap();

        let content = fs::read_to_string(&gitignore_path).unwrap();
        assert!(content.contains("Custom content"));
        assert!(!content.contains("!*.jsonl"));
    }
}
