//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

pub mod commands;

/// Folio - encrypted notes with content-addressed attachments
#[derive(Parser, Debug)]
#[command(name = "folio", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database path (default: ~/.folio/data/folio.db)
    #[arg(long, global = true, env = "FOLIO_DB")]
    pub db: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the database
    Init {
        /// Overwrite an existing database
        #[arg(long)]
        force: bool,
    },

    /// Print version information
    Version,

    /// Write note content (creates or updates)
    Add(AddArgs),

    /// Read note content
    Get(GetArgs),

    /// Soft-delete content
    Remove {
        /// Content IDs (or note IDs with --by-note)
        #[arg(required = true)]
        ids: Vec<String>,

        /// Treat the IDs as note IDs
        #[arg(long)]
        by_note: bool,
    },

    /// Attachment management
    Attachments {
        #[command(subcommand)]
        command: AttachmentCommands,
    },

    /// Sync with JSONL files
    Sync {
        #[command(subcommand)]
        command: SyncCommands,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

// ============================================================================
// Content Commands
// ============================================================================

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Body to store; `-` reads stdin
    pub data: Option<String>,

    /// Note the content belongs to
    #[arg(short, long)]
    pub note: Option<String>,

    /// Existing content ID to update
    #[arg(long)]
    pub id: Option<String>,

    /// Read the body from a file
    #[arg(short, long, conflicts_with = "data")]
    pub file: Option<PathBuf>,

    /// Parse the body as JSON (cipher objects, wrappers)
    #[arg(long)]
    pub raw_json: bool,

    /// Keep the content on this device only
    #[arg(long)]
    pub local_only: bool,

    /// Editing session for history snapshots (default: actor name)
    #[arg(long, env = "FOLIO_SESSION")]
    pub session: Option<String>,

    /// Skip the history snapshot
    #[arg(long)]
    pub no_history: bool,
}

#[derive(Args, Debug)]
pub struct GetArgs {
    /// Content ID
    #[arg(required_unless_present = "note")]
    pub id: Option<String>,

    /// Look up the newest live content of a note instead
    #[arg(short, long, conflicts_with = "id")]
    pub note: Option<String>,

    /// Print the default empty content when the note has none (with --note)
    #[arg(long, requires = "note")]
    pub or_empty: bool,

    /// How to resolve attachment references
    #[arg(long, value_enum, default_value_t)]
    pub media: MediaMode,

    /// Placeholder source (with --media placeholder)
    #[arg(long)]
    pub placeholder: Option<String>,

    /// Download group (with --media download)
    #[arg(long, default_value = "folio-cli")]
    pub group: String,

    /// Tell the downloader not to read files on arrival (with --media download)
    #[arg(long)]
    pub notify: bool,
}

/// Read-time media resolution.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MediaMode {
    /// Stored body, hash references only
    #[default]
    None,
    /// Inline locally available attachments
    Inline,
    /// Replace attachments with a placeholder
    Placeholder,
    /// Queue downloads, then inline what is available
    Download,
}

// ============================================================================
// Attachment Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum AttachmentCommands {
    /// List known attachments
    List {
        /// Only attachments linked to this note
        #[arg(short, long)]
        note: Option<String>,
    },

    /// Remove attachments from a content body
    Remove {
        /// Content ID
        id: String,

        /// Attachment hashes to remove
        #[arg(required = true)]
        hashes: Vec<String>,
    },
}

// ============================================================================
// Sync Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum SyncCommands {
    /// Export to JSONL
    Export {
        /// Overwrite records that exist only in the file
        #[arg(long)]
        force: bool,

        /// Export directory (default: configured or next to the database)
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Import from JSONL
    Import {
        /// Import directory (default: configured or next to the database)
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Merge strategy (prefer-newer, prefer-local, prefer-remote)
        #[arg(long)]
        strategy: Option<String>,
    },

    /// Show sync status
    Status {
        /// Export directory (default: configured or next to the database)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}
