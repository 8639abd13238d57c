//! Command implementations.

pub mod attachments;
pub mod completions;
pub mod content;
pub mod init;
pub mod sync;
pub mod version;

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::config::{Settings, load_settings, resolve_db_path};
use crate::content::LocalContentStore;
use crate::error::{Error, Result};
use crate::storage::SqliteStorage;

/// An opened database with the settings and the store built on top of it.
pub struct Workspace {
    pub db_path: PathBuf,
    pub storage: Arc<SqliteStorage>,
    pub settings: Settings,
    pub store: LocalContentStore,
}

impl Workspace {
    /// Open the resolved database. It must already exist.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` if there is no database, or an error if the
    /// settings or the database cannot be loaded.
    pub fn open(db_path: Option<&PathBuf>) -> Result<Self> {
        let db_path = resolve_db_path(db_path.map(PathBuf::as_path)).ok_or(Error::NotInitialized)?;
        if !db_path.exists() {
            return Err(Error::NotInitialized);
        }

        let settings = load_settings()?;
        let storage = Arc::new(SqliteStorage::open(&db_path)?);
        let store = LocalContentStore::local(Arc::clone(&storage))
            .with_merge_strategy(settings.merge_strategy())
            .with_conflict_threshold(settings.conflict_threshold_ms());

        Ok(Self {
            db_path,
            storage,
            settings,
            store,
        })
    }
}

/// Runtime for driving the async store from a command.
///
/// # Errors
///
/// Returns an error if the runtime cannot be started.
pub fn runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Runtime::new()?)
}

/// Print one JSON document on stdout.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}
