//! Create the Folio database.
//!
//! `folio init` creates the database at the resolved path (see
//! [`resolve_db_path`]) and applies the schema. A settings file with the
//! defaults spelled out is written next to it when none exists.

use std::fs;
use std::path::{Path, PathBuf};

use colored::Colorize;
use serde::Serialize;

use crate::config::{Settings, config_path, resolve_db_path, save_settings_to};
use crate::content::{DEFAULT_CONFLICT_THRESHOLD_MS, MergeStrategy};
use crate::error::{Error, Result};
use crate::storage::SqliteStorage;

#[derive(Serialize)]
struct InitOutput {
    database: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    config: Option<PathBuf>,
}

/// Execute the init command.
///
/// # Errors
///
/// Returns `AlreadyInitialized` if the database exists and `force` is not
/// set, or an error if the directory or database cannot be created.
pub fn execute(db_path: Option<&PathBuf>, force: bool, json: bool) -> Result<()> {
    let db_path = resolve_db_path(db_path.map(PathBuf::as_path))
        .ok_or_else(|| Error::Config("Could not determine the database location".to_string()))?;

    let output = init_at(db_path, &config_path()?, force)?;

    if json {
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("{}", "Initialized Folio database".green());
        println!("  Database: {}", output.database.display());
        if let Some(config) = &output.config {
            println!("  Settings: {}", config.display());
        }
    }

    Ok(())
}

fn init_at(db_path: PathBuf, config: &Path, force: bool) -> Result<InitOutput> {
    if db_path.exists() {
        if !force {
            return Err(Error::AlreadyInitialized { path: db_path });
        }
        fs::remove_file(&db_path)?;
        for suffix in ["-wal", "-shm"] {
            let mut side = db_path.clone().into_os_string();
            side.push(suffix);
            let side = PathBuf::from(side);
            if side.exists() {
                fs::remove_file(side)?;
            }
        }
    }

    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)?;
    }
    SqliteStorage::open(&db_path)?;

    let written = if config.exists() {
        None
    } else {
        save_settings_to(
            config,
            &Settings {
                merge_strategy: Some(MergeStrategy::default()),
                conflict_threshold_ms: Some(DEFAULT_CONFLICT_THRESHOLD_MS),
                ..Settings::default()
            },
        )?;
        Some(config.to_path_buf())
    };

    Ok(InitOutput {
        database: db_path,
        config: written,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_settings_from;
    use tempfile::TempDir;

    #[test]
    fn test_init_creates_database_and_settings() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("data").join("folio.db");
        let config = temp_dir.path().join("config.json");

        let output = init_at(db_path.clone(), &config, false).unwrap();
        assert!(db_path.exists());
        assert_eq!(output.config.as_deref(), Some(config.as_path()));

        let storage = SqliteStorage::open(&db_path).unwrap();
        assert_eq!(storage.content_counts().unwrap().total(), 0);
        let settings = load_settings_from(&config).unwrap();
        assert_eq!(settings.merge_strategy, Some(MergeStrategy::PreferNewer));
    }

    #[test]
    fn test_init_fails_if_already_initialized() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("folio.db");
        let config = temp_dir.path().join("config.json");

        init_at(db_path.clone(), &config, false).unwrap();
        let result = init_at(db_path.clone(), &config, false);
        assert!(matches!(result, Err(Error::AlreadyInitialized { .. })));

        let forced = init_at(db_path, &config, true).unwrap();
        assert!(forced.config.is_none());
    }
}
