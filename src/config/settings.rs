//! User settings stored in `~/.folio/config.json`.
//!
//! Every field is optional; a missing file or field falls back to the
//! built-in default. Environment variables override the file where noted.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::content::{DEFAULT_CONFLICT_THRESHOLD_MS, MergeStrategy};
use crate::error::{Error, Result};

/// Image source shown in place of media for low-bandwidth previews.
pub const DEFAULT_PLACEHOLDER: &str = "/images/media-placeholder.svg";

/// Folio configuration file structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_strategy: Option<MergeStrategy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict_threshold_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_dir: Option<PathBuf>,
}

impl Settings {
    /// Merge strategy: `FOLIO_MERGE_STRATEGY` > config > default.
    ///
    /// An unparseable environment value is ignored.
    #[must_use]
    pub fn merge_strategy(&self) -> MergeStrategy {
        if let Ok(value) = std::env::var("FOLIO_MERGE_STRATEGY") {
            match value.parse() {
                Ok(strategy) => return strategy,
                Err(e) => debug!(error = %e, "Ignoring FOLIO_MERGE_STRATEGY"),
            }
        }
        self.merge_strategy.unwrap_or_default()
    }

    #[must_use]
    pub fn conflict_threshold_ms(&self) -> i64 {
        self.conflict_threshold_ms
            .unwrap_or(DEFAULT_CONFLICT_THRESHOLD_MS)
    }

    #[must_use]
    pub fn placeholder(&self) -> &str {
        self.placeholder.as_deref().unwrap_or(DEFAULT_PLACEHOLDER)
    }

    /// Export directory, relative to `db_path`'s directory when not configured.
    #[must_use]
    pub fn export_dir(&self, db_path: &Path) -> PathBuf {
        self.export_dir
            .clone()
            .unwrap_or_else(|| crate::sync::default_export_dir(db_path))
    }
}

/// Get the config file path: `FOLIO_CONFIG` or `~/.folio/config.json`.
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("FOLIO_CONFIG") {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    super::global_folio_dir()
        .map(|dir| dir.join("config.json"))
        .ok_or_else(|| Error::Config("Could not determine home directory".into()))
}

/// Load settings from the default location.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_settings() -> Result<Settings> {
    load_settings_from(&config_path()?)
}

/// Load settings from `path`. A missing file yields the defaults.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_settings_from(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }

    let content = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read config file: {e}")))?;

    serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse config file: {e}")))
}

/// Save settings to the default location.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn save_settings(settings: &Settings) -> Result<()> {
    save_settings_to(&config_path()?, settings)
}

/// Save settings to `path`, creating its directory.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn save_settings_to(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| Error::Config(format!("Failed to create config directory: {e}")))?;
    }

    let content = serde_json::to_string_pretty(settings)
        .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;

    fs::write(path, content)
        .map_err(|e| Error::Config(format!("Failed to write config file: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let settings = load_settings_from(&temp_dir.path().join("config.json")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.conflict_threshold_ms(), DEFAULT_CONFLICT_THRESHOLD_MS);
        assert_eq!(settings.placeholder(), DEFAULT_PLACEHOLDER);
        assert_eq!(
            settings.export_dir(Path::new("/data/folio.db")),
            PathBuf::from("/data/sync")
        );
    }

    #[test]
    fn test_save_then_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.json");
        let settings = Settings {
            merge_strategy: Some(MergeStrategy::PreferRemote),
            conflict_threshold_ms: Some(5_000),
            placeholder: None,
            export_dir: Some(PathBuf::from("/tmp/out")),
        };

        save_settings_to(&path, &settings).unwrap();
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"mergeStrategy\": \"prefer_remote\""));
        assert!(!raw.contains("placeholder"));

        assert_eq!(load_settings_from(&path).unwrap(), settings);
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        let err = load_settings_from(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
