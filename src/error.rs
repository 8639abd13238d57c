//! Error types for Folio.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=db, 3=not_found, 4=validation, etc.)
//! - Retryability flags for scripted callers
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers
//!
//! Tolerated failures (a blob that could not be saved, a stale attachment
//! hash, a history append that failed) are not errors. They are reported as
//! [`crate::content::PartialFailure`] values next to a successful result.

use std::path::PathBuf;
use thiserror::Error;

use crate::sync::SyncError;

/// Result type alias for Folio operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Database (exit 2)
    NotInitialized,
    AlreadyInitialized,
    DatabaseError,

    // Not Found (exit 3)
    ContentNotFound,

    // Validation (exit 4)
    MissingOwner,
    InvalidUsage,
    InvalidArgument,

    // Sync (exit 6)
    SyncError,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::AlreadyInitialized => "ALREADY_INITIALIZED",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::ContentNotFound => "CONTENT_NOT_FOUND",
            Self::MissingOwner => "MISSING_OWNER",
            Self::InvalidUsage => "INVALID_USAGE",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::SyncError => "SYNC_ERROR",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-8).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::NotInitialized | Self::AlreadyInitialized | Self::DatabaseError => 2,
            Self::ContentNotFound => 3,
            Self::MissingOwner | Self::InvalidUsage | Self::InvalidArgument => 4,
            Self::SyncError => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether a caller should retry with corrected input.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::MissingOwner | Self::InvalidUsage | Self::InvalidArgument | Self::DatabaseError
        )
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in Folio operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not initialized: run `folio init` first")]
    NotInitialized,

    #[error("Already initialized at {path}")]
    AlreadyInitialized { path: PathBuf },

    #[error("Content not found: {id}")]
    ContentNotFound { id: String },

    /// A write could not be linked to a note.
    #[error("No note id found to link the content to")]
    MissingOwner,

    /// A call went through the wrong entry point.
    #[error("Invalid usage: {0}")]
    InvalidUsage(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized => ErrorCode::NotInitialized,
            Self::AlreadyInitialized { .. } => ErrorCode::AlreadyInitialized,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::ContentNotFound { .. } => ErrorCode::ContentNotFound,
            Self::MissingOwner => ErrorCode::MissingOwner,
            Self::InvalidUsage(_) => ErrorCode::InvalidUsage,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Sync(_) => ErrorCode::SyncError,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::NotInitialized => Some("Run `folio init` to create the database".to_string()),

            Self::AlreadyInitialized { path } => Some(format!(
                "Database already exists at {}. Use `--force` to reinitialize.",
                path.display()
            )),

            Self::ContentNotFound { id } => Some(format!(
                "No live content with ID '{id}'. Deleted content is not readable."
            )),

            Self::MissingOwner => Some(
                "Pass `--note <note-id>` when creating content, or an `--id` of existing content"
                    .to_string(),
            ),

            Self::InvalidUsage(msg) if msg.contains("merge") => Some(
                "Remote records go through `folio sync import`, not `folio add`".to_string(),
            ),

            Self::InvalidUsage(_)
            | Self::InvalidArgument(_)
            | Self::Database(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Sync(_)
            | Self::Config(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_owner_is_validation_category() {
        let err = Error::MissingOwner;
        assert_eq!(err.error_code(), ErrorCode::MissingOwner);
        assert_eq!(err.exit_code(), 4);
        assert!(err.hint().is_some());
    }

    #[test]
    fn test_structured_json_carries_code_and_hint() {
        let err = Error::InvalidUsage("use merge for remote content".to_string());
        let json = err.to_structured_json();
        assert_eq!(json["error"]["code"], "INVALID_USAGE");
        assert_eq!(json["error"]["exit_code"], 4);
        assert!(json["error"]["hint"].is_string());
    }

    #[test]
    fn test_not_found_not_retryable() {
        let err = Error::ContentNotFound { id: "c1".into() };
        assert!(!err.error_code().is_retryable());
        assert_eq!(err.exit_code(), 3);
    }
}
