//! Content commands: add, get, remove.

use std::io::Read;
use std::path::PathBuf;

use chrono::{TimeZone, Utc};
use colored::Colorize;
use serde_json::Value;

use super::{Workspace, print_json, runtime};
use crate::cli::{AddArgs, GetArgs, MediaMode};
use crate::config::default_actor;
use crate::error::{Error, Result};
use crate::model::{ContentItem, ContentPatch, StoredBody};

/// Execute the add command.
///
/// # Errors
///
/// Returns an error if the body cannot be read or the write fails.
pub fn execute_add(args: &AddArgs, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let ws = Workspace::open(db_path)?;

    let data = read_body(args)?
        .map(|text| {
            if args.raw_json {
                serde_json::from_str::<Value>(&text)
                    .map_err(|e| Error::InvalidArgument(format!("Body is not valid JSON: {e}")))
            } else {
                Ok(Value::String(text))
            }
        })
        .transpose()?;

    let patch = ContentPatch {
        id: args.id.clone(),
        note_id: args.note.clone(),
        data,
        local_only: args.local_only.then_some(true),
        session_id: if args.no_history {
            None
        } else {
            Some(args.session.clone().unwrap_or_else(default_actor))
        },
        ..ContentPatch::default()
    };

    let report = runtime()?.block_on(ws.store.add_with_report(patch))?;

    if json {
        return print_json(&report);
    }

    println!("{} {}", "Saved content".green(), report.id.bold());
    for failure in &report.partial_failures {
        println!("  {} {failure}", "warning:".yellow());
    }
    Ok(())
}

/// Body from the positional argument, stdin (`-`) or `--file`.
fn read_body(args: &AddArgs) -> Result<Option<String>> {
    if let Some(path) = &args.file {
        return Ok(Some(std::fs::read_to_string(path)?));
    }
    match args.data.as_deref() {
        Some("-") => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text)?;
            Ok(Some(text))
        }
        Some(text) => Ok(Some(text.to_string())),
        None => Ok(None),
    }
}

/// Execute the get command.
///
/// # Errors
///
/// Returns `ContentNotFound` if there is no live content, or an error if a
/// read fails.
pub fn execute_get(args: &GetArgs, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let ws = Workspace::open(db_path)?;
    let rt = runtime()?;

    let found = match (&args.id, &args.note) {
        (Some(id), _) => rt.block_on(ws.store.get(id))?,
        (None, Some(note_id)) => ws.storage.content_for_note(note_id)?,
        (None, None) => return Err(Error::InvalidArgument("Pass a content id or --note".into())),
    };
    let item = match (found, &args.note) {
        (Some(item), _) => item,
        (None, Some(note_id)) if args.or_empty => ContentItem::empty(note_id),
        (None, _) => {
            let id = args.id.clone().or_else(|| args.note.clone()).unwrap_or_default();
            return Err(Error::ContentNotFound { id });
        }
    };

    let item = match args.media {
        MediaMode::None => item,
        MediaMode::Inline => rt.block_on(ws.store.insert_media(&item))?,
        MediaMode::Placeholder => {
            let placeholder = args
                .placeholder
                .as_deref()
                .unwrap_or_else(|| ws.settings.placeholder());
            ws.store.insert_placeholders(&item, placeholder)
        }
        MediaMode::Download => {
            rt.block_on(ws.store.download_media(&args.group, &item, args.notify))?
        }
    };

    if json {
        return print_json(&item);
    }
    print_item(&item);
    Ok(())
}

fn print_item(item: &ContentItem) {
    println!("{} {}", "Content".bold(), item.id.cyan());
    println!("  Note:     {}", item.note_id);
    println!("  Type:     {}", item.content_type.as_str());
    println!("  Edited:   {}", format_millis(item.date_edited));
    println!("  Modified: {}", format_millis(item.date_modified));
    if item.local_only {
        println!("  {}", "local only".dimmed());
    }
    if !item.synced && !item.local_only {
        println!("  {}", "not exported".yellow());
    }
    if item.conflicted.is_some() {
        println!("  {}", "conflicted: a remote copy is kept alongside".red());
    }
    println!();
    match &item.data {
        StoredBody::Plaintext(body) => println!("{body}"),
        StoredBody::Cipher(cipher) => println!(
            "{} ({}, {} bytes)",
            "[encrypted]".magenta(),
            cipher.alg,
            cipher.length
        ),
    }
}

fn format_millis(millis: i64) -> String {
    Utc.timestamp_millis_opt(millis)
        .single()
        .map_or_else(|| millis.to_string(), |t| t.to_rfc3339())
}

/// Execute the remove command.
///
/// # Errors
///
/// Returns an error if the write fails.
pub fn execute_remove(
    ids: &[String],
    by_note: bool,
    db_path: Option<&PathBuf>,
    json: bool,
) -> Result<()> {
    let ws = Workspace::open(db_path)?;
    let rt = runtime()?;

    let removed = if by_note {
        rt.block_on(ws.store.remove_by_note_id(ids))?
    } else {
        rt.block_on(ws.store.remove(ids))?
    };

    if json {
        return print_json(&serde_json::json!({ "removed": removed }));
    }
    if removed == 0 {
        println!("{}", "Nothing to remove.".dimmed());
    } else {
        println!("{} {removed} record(s)", "Removed".green());
    }
    Ok(())
}
