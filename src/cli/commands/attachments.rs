//! Attachment commands.

use std::path::PathBuf;

use colored::Colorize;
use serde::Serialize;

use super::{Workspace, print_json, runtime};
use crate::cli::AttachmentCommands;
use crate::error::Result;
use crate::model::{Attachment, ItemReference, ItemType};

/// Execute attachment commands.
///
/// # Errors
///
/// Returns an error if the database read or write fails.
pub fn execute(command: &AttachmentCommands, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    match command {
        AttachmentCommands::List { note } => list(note.as_deref(), db_path, json),
        AttachmentCommands::Remove { id, hashes } => remove(id, hashes, db_path, json),
    }
}

/// An attachment with the notes linking to it.
#[derive(Serialize)]
struct AttachmentRow {
    #[serde(flatten)]
    attachment: Attachment,
    notes: Vec<String>,
}

fn list(note: Option<&str>, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let ws = Workspace::open(db_path)?;

    let attachments: Vec<Attachment> = match note {
        Some(note_id) => {
            let mut linked = Vec::new();
            for relation in ws
                .storage
                .related(&ItemReference::note(note_id), ItemType::Attachment)?
            {
                if let Some(attachment) = ws.storage.get_attachment(&relation.id)? {
                    linked.push(attachment);
                }
            }
            linked
        }
        None => ws.storage.list_attachments()?,
    };

    let rows = attachments
        .into_iter()
        .map(|attachment| {
            let notes = ws.storage.notes_referencing(&attachment.hash)?;
            Ok(AttachmentRow { attachment, notes })
        })
        .collect::<Result<Vec<_>>>()?;

    if json {
        return print_json(&rows);
    }

    if rows.is_empty() {
        println!("{}", "No attachments.".dimmed());
        return Ok(());
    }

    for AttachmentRow { attachment, notes } in &rows {
        let availability = if attachment.local {
            "local".green()
        } else {
            "remote".yellow()
        };
        println!(
            "{}  {:<24} {:>8} B  {}",
            attachment.hash.cyan(),
            attachment.mime_type,
            attachment.size,
            availability
        );
        if let Some(filename) = &attachment.filename {
            println!("    {}", filename.dimmed());
        }
        if notes.is_empty() {
            println!("    {}", "not linked to any note".dimmed());
        } else {
            println!("    notes: {}", notes.join(", "));
        }
    }
    println!();
    println!("{} attachment(s)", rows.len());
    Ok(())
}

fn remove(id: &str, hashes: &[String], db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let ws = Workspace::open(db_path)?;
    runtime()?.block_on(ws.store.remove_attachments(id, hashes))?;

    if json {
        return print_json(&serde_json::json!({ "id": id, "removed": hashes }));
    }
    println!(
        "{} {} attachment reference(s) from {}",
        "Removed".green(),
        hashes.len(),
        id.bold()
    );
    Ok(())
}
