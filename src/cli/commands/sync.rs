//! Sync command implementations (JSONL export/import).
//!
//! The export directory is `--dir`, else `exportDir` from the settings, else
//! `sync/` next to the database.

use std::path::PathBuf;

use colored::Colorize;

use super::{Workspace, print_json, runtime};
use crate::cli::SyncCommands;
use crate::content::MergeStrategy;
use crate::error::{Error, Result};
use crate::sync::{EntityStats, Exporter, Importer, SyncError, get_sync_status, print_status};

/// Execute sync commands.
///
/// # Errors
///
/// Returns an error if the database or the export files cannot be used.
pub fn execute(command: &SyncCommands, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    match command {
        SyncCommands::Export { force, dir } => export(*force, dir.as_ref(), db_path, json),
        SyncCommands::Import { dir, strategy } => {
            import(dir.as_ref(), strategy.as_deref(), db_path, json)
        }
        SyncCommands::Status { dir } => status(dir.as_ref(), db_path, json),
    }
}

fn export_dir(ws: &Workspace, dir: Option<&PathBuf>) -> PathBuf {
    dir.cloned()
        .unwrap_or_else(|| ws.settings.export_dir(&ws.db_path))
}

fn export(force: bool, dir: Option<&PathBuf>, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let ws = Workspace::open(db_path)?;
    let output_dir = export_dir(&ws, dir);

    let exporter = Exporter::new(&ws.store, output_dir.clone());
    match runtime()?.block_on(exporter.export(force)) {
        Ok(stats) => {
            if json {
                print_json(&serde_json::json!({
                    "success": true,
                    "output_dir": output_dir.display().to_string(),
                    "stats": stats,
                }))?;
            } else {
                println!("{}", "Export complete".green());
                println!();
                println!("  Content:    {}", stats.content);
                if stats.tombstones > 0 {
                    println!("  Tombstones: {}", stats.tombstones);
                }
                if stats.local_only_skipped > 0 {
                    println!("  Local-only: {} (not exported)", stats.local_only_skipped);
                }
                println!();
                println!("  Total: {} records", stats.total());
                println!("  Location: {}", output_dir.display());
            }
            Ok(())
        }
        Err(SyncError::NothingToExport) => {
            if json {
                print_json(&serde_json::json!({
                    "error": "nothing_to_export",
                    "message": "No syncable content to export.",
                }))?;
            } else {
                println!("{}", "No syncable content to export.".dimmed());
            }
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn import(
    dir: Option<&PathBuf>,
    strategy: Option<&str>,
    db_path: Option<&PathBuf>,
    json: bool,
) -> Result<()> {
    let ws = Workspace::open(db_path)?;
    let import_dir = export_dir(&ws, dir);

    let store = match strategy {
        Some(name) => {
            let strategy: MergeStrategy = name.parse().map_err(Error::InvalidArgument)?;
            ws.store.with_merge_strategy(strategy)
        }
        None => ws.store,
    };

    let stats = runtime()?.block_on(Importer::new(&store).import_all(&import_dir))?;
    let total = stats.total_processed();

    if json {
        return print_json(&serde_json::json!({
            "success": true,
            "import_dir": import_dir.display().to_string(),
            "strategy": store.merge_strategy().as_str(),
            "stats": stats,
        }));
    }

    if total == 0 {
        println!("{}", "No records to import.".dimmed());
        println!("Export files not found in: {}", import_dir.display());
        return Ok(());
    }

    println!("{}", "Import complete".green());
    println!();
    print_entity_stats("Content", &stats.content);
    if stats.content.conflicts > 0 {
        println!();
        println!(
            "{}",
            format!(
                "{} record(s) conflicted; the remote copy is kept on the local record.",
                stats.content.conflicts
            )
            .yellow()
        );
    }
    Ok(())
}

fn print_entity_stats(name: &str, stats: &EntityStats) {
    println!(
        "  {name}: {} created, {} updated, {} deleted, {} skipped, {} conflicts",
        stats.created, stats.updated, stats.deleted, stats.skipped, stats.conflicts
    );
}

fn status(dir: Option<&PathBuf>, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let ws = Workspace::open(db_path)?;
    let export_dir = export_dir(&ws, dir);

    let sync_status = get_sync_status(&ws.storage, &export_dir)?;

    if json {
        print_json(&sync_status)
    } else {
        print_status(&sync_status);
        Ok(())
    }
}
