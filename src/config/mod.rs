//! Configuration management.
//!
//! Resolves where the database lives and loads user settings.
//!
//! # Layout
//!
//! Everything lives under `~/.folio/`:
//! - **Database**: `~/.folio/data/folio.db`
//! - **Test database**: `~/.folio/test/folio.db` (when `FOLIO_TEST_DB` is set)
//! - **Settings**: `~/.folio/config.json`
//! - **Exports**: `sync/` next to the database unless `exportDir` is configured

mod settings;

pub use settings::{
    DEFAULT_PLACEHOLDER, Settings, config_path, load_settings, load_settings_from, save_settings,
    save_settings_to,
};

use std::path::{Path, PathBuf};

/// Database file name.
const DB_FILE: &str = "folio.db";

/// Get the global Folio directory (`~/.folio/`).
#[must_use]
pub fn global_folio_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".folio"))
}

/// Check if test mode is enabled.
///
/// Test mode is enabled by setting `FOLIO_TEST_DB` to any value other than
/// empty, `0` or `false`. It redirects the database to an isolated file.
#[must_use]
pub fn is_test_mode() -> bool {
    std::env::var("FOLIO_TEST_DB").is_ok_and(|v| is_truthy(&v))
}

fn is_truthy(value: &str) -> bool {
    !value.is_empty() && value != "0" && !value.eq_ignore_ascii_case("false")
}

/// Get the test database path (`~/.folio/test/folio.db`).
#[must_use]
pub fn test_db_path() -> Option<PathBuf> {
    global_folio_dir().map(|dir| dir.join("test").join(DB_FILE))
}

/// Resolve the database path.
///
/// Priority:
/// 1. `explicit_path` (the `--db` flag)
/// 2. `FOLIO_TEST_DB` → test database
/// 3. `FOLIO_DB` environment variable
/// 4. `~/.folio/data/folio.db`
///
/// Returns `None` only when no home directory can be determined.
#[must_use]
pub fn resolve_db_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }

    if is_test_mode() {
        return test_db_path();
    }

    if let Ok(db_path) = std::env::var("FOLIO_DB") {
        if !db_path.trim().is_empty() {
            return Some(PathBuf::from(db_path));
        }
    }

    global_folio_dir().map(|dir| dir.join("data").join(DB_FILE))
}

/// Get the default actor name, used as the history session when none is
/// given.
///
/// Priority:
/// 1. `FOLIO_ACTOR` environment variable
/// 2. Git user name
/// 3. System username
/// 4. "unknown"
#[must_use]
pub fn default_actor() -> String {
    if let Ok(actor) = std::env::var("FOLIO_ACTOR") {
        if !actor.is_empty() {
            return actor;
        }
    }

    if let Ok(output) = std::process::Command::new("git")
        .args(["config", "user.name"])
        .output()
    {
        if output.status.success() {
            let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if !name.is_empty() {
                return name;
            }
        }
    }

    if let Ok(user) = std::env::var("USER") {
        return user;
    }

    "unknown".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_actor() {
        assert!(!default_actor().is_empty());
    }

    #[test]
    fn test_resolve_db_path_with_explicit() {
        let explicit = PathBuf::from("/custom/path/db.sqlite");
        assert_eq!(resolve_db_path(Some(&explicit)), Some(explicit));
    }

    #[test]
    fn test_resolve_db_path_default_name() {
        let path = resolve_db_path(None).unwrap();
        assert!(path.ends_with(DB_FILE));
    }

    #[test]
    fn test_test_db_path_is_separate() {
        let global = global_folio_dir().unwrap();
        let test = test_db_path().unwrap();

        assert!(test.to_string_lossy().contains("test"));
        assert!(test.ends_with(DB_FILE));
        assert_ne!(global.join("data").join(DB_FILE), test);
    }

    #[test]
    fn test_truthy_values() {
        for falsy in ["", "0", "false", "FALSE"] {
            assert!(!is_truthy(falsy), "{falsy:?} should be falsy");
        }
        for truthy in ["1", "true", "yes"] {
            assert!(is_truthy(truthy), "{truthy:?} should be truthy");
        }
    }
}
