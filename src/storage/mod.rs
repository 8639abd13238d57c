//! Storage layer for Folio.
//!
//! The content store consumes persistence through the traits in [`traits`].
//! [`SqliteStorage`] implements all of them on one SQLite database with:
//! - WAL mode for concurrent reads
//! - Transaction discipline for atomic writes
//! - A `synced` flag on content for snapshot export
//!
//! # Submodules
//!
//! - [`traits`] - Collaborator interfaces
//! - [`schema`] - Database schema definitions
//! - [`sqlite`] - Connection handling and the content table
//! - [`attachments`] - Content-addressed blobs and the download queue
//! - [`relations`] - Item links
//! - [`history`] - Per-session snapshots

pub mod attachments;
pub mod history;
pub mod migrations;
pub mod relations;
pub mod schema;
pub mod sqlite;
pub mod traits;

pub use attachments::QueuedDownload;
pub use history::HistoryEntry;
pub use sqlite::{ContentCounts, SqliteStorage};
pub use traits::{AttachmentBridge, HistorySink, KeyedCollection, RelationIndex};
