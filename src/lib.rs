//! Folio - local-first note content store
//!
//! This crate provides the content collection behind the `folio` CLI: note
//! bodies that are either plaintext or an encrypted cipher, with inline media
//! moved into a content-addressed attachment store on write and resolved back
//! on read.
//!
//! # Architecture
//!
//! - [`content`] - The content store: add/get/remove, extraction, media resolution, merge
//! - [`codec`] - Format-specific body parsing and rewriting
//! - [`model`] - Data types (`ContentItem`, `Attachment`, `ItemReference`)
//! - [`storage`] - Collaborator traits and their SQLite implementation
//! - [`sync`] - JSONL import/export operations
//! - [`config`] - Database location and user settings
//! - [`cli`] - Command-line interface using clap
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod codec;
pub mod config;
pub mod content;
pub mod crypto;
pub mod error;
pub mod hash;
pub mod model;
pub mod storage;
pub mod sync;

pub use content::{ContentStore, LocalContentStore};
pub use error::{Error, Result};
