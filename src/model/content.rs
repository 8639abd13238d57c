//! Document content records.
//!
//! A [`ContentItem`] is the stored body of one note. Whether the body is
//! plaintext or ciphertext is carried by the [`StoredBody`] variant, and the
//! serialized `locked` flag is derived from it. On the way in, untrusted
//! payloads are classified into a [`Body`] first.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::crypto::is_cipher;
use crate::hash::content_hash;

/// Body written for content that has never been edited.
pub const EMPTY_BODY: &str = "<p></p>";

/// Format tag telling the codec layer how to read a body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    /// HTML produced by the rich-text editor.
    #[default]
    Tiptap,
}

impl ContentType {
    /// Get the string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Tiptap => "tiptap",
        }
    }

    /// Parse from the stored string. Unknown formats return `None`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "tiptap" => Some(Self::Tiptap),
            _ => None,
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encrypted payload as produced by the client-side crypto layer.
///
/// The store only moves these around; it never decrypts them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cipher {
    pub iv: String,
    pub cipher: String,
    pub salt: String,
    pub length: u64,
    pub alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// A body as it is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredBody {
    Plaintext(String),
    Cipher(Cipher),
}

impl StoredBody {
    #[must_use]
    pub const fn is_locked(&self) -> bool {
        matches!(self, Self::Cipher(_))
    }

    /// The plaintext body, if the record is unlocked.
    #[must_use]
    pub fn as_plaintext(&self) -> Option<&str> {
        match self {
            Self::Plaintext(text) => Some(text),
            Self::Cipher(_) => None,
        }
    }

    /// Encode for the `data` column: plaintext verbatim, ciphers as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the cipher cannot be serialized.
    pub fn to_column(&self) -> serde_json::Result<String> {
        match self {
            Self::Plaintext(text) => Ok(text.clone()),
            Self::Cipher(cipher) => serde_json::to_string(cipher),
        }
    }

    /// Decode the `data` column. `locked` decides the interpretation.
    ///
    /// # Errors
    ///
    /// Returns an error if a locked column does not hold a cipher object.
    pub fn from_column(locked: bool, column: String) -> serde_json::Result<Self> {
        if locked {
            serde_json::from_str(&column).map(Self::Cipher)
        } else {
            Ok(Self::Plaintext(column))
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Self::Plaintext(text) => Value::String(text.clone()),
            Self::Cipher(cipher) => serde_json::to_value(cipher).unwrap_or(Value::Null),
        }
    }
}

/// An incoming body, classified once at the write boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Plaintext(String),
    Cipher(Cipher),
    /// An object with neither plaintext nor cipher markers. Kept raw for the
    /// placeholder.
    Malformed(Value),
    /// Cipher markers without a complete cipher, or a bare scalar or array.
    /// Carries no usable body; the prior plaintext is kept.
    Unusable(Value),
}

impl Body {
    /// Classify an untrusted JSON payload. `null` means no body was supplied.
    #[must_use]
    pub fn classify(value: Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::String(text) => Some(Self::Plaintext(text)),
            Value::Object(map) => {
                if let Some(Value::String(inner)) = map.get("data") {
                    return Some(Self::Plaintext(inner.clone()));
                }
                let has_markers = ["iv", "cipher"]
                    .iter()
                    .any(|key| map.get(*key).is_some_and(is_present));
                let value = Value::Object(map);
                if !has_markers {
                    return Some(Self::Malformed(value));
                }
                if is_cipher(&value) {
                    if let Ok(cipher) = serde_json::from_value::<Cipher>(value.clone()) {
                        return Some(Self::Cipher(cipher));
                    }
                }
                Some(Self::Unusable(value))
            }
            other => Some(Self::Unusable(other)),
        }
    }

    /// Visible placeholder written in place of a malformed payload.
    #[must_use]
    pub fn placeholder(raw: &Value) -> String {
        let json = raw.to_string();
        format!("<p>Content is invalid: {}</p>", escape_html(&json))
    }
}

/// A marker counts when it holds something: not null, false, zero or empty.
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f.abs() > 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            _ => out.push(ch),
        }
    }
    out
}

/// The unit of storage: the content of one note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawContentItem", into = "RawContentItem")]
pub struct ContentItem {
    pub id: String,
    pub note_id: String,
    pub content_type: ContentType,
    pub data: StoredBody,
    /// Never synced, never extracted.
    pub local_only: bool,
    pub date_created: i64,
    /// Changes only when the body changes.
    pub date_edited: i64,
    /// Changes on every mutation.
    pub date_modified: i64,
    /// Remote copy kept aside when a merge found divergent edits.
    pub conflicted: Option<Box<ContentItem>>,
    pub date_resolved: Option<i64>,
    pub deleted: bool,
    /// False while the record has local changes that were not exported.
    pub synced: bool,
}

impl ContentItem {
    /// Default empty content for a note.
    #[must_use]
    pub fn empty(note_id: &str) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: new_content_id(),
            note_id: note_id.to_string(),
            content_type: ContentType::Tiptap,
            data: StoredBody::Plaintext(EMPTY_BODY.to_string()),
            local_only: true,
            date_created: now,
            date_edited: now,
            date_modified: now,
            conflicted: None,
            date_resolved: None,
            deleted: false,
            synced: false,
        }
    }

    #[must_use]
    pub const fn locked(&self) -> bool {
        self.data.is_locked()
    }

    /// Fingerprint of what a merge compares: format, body and tombstone state.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        #[derive(Serialize)]
        struct Fingerprint<'a> {
            content_type: &'a str,
            data: Value,
            deleted: bool,
        }

        content_hash(&Fingerprint {
            content_type: self.content_type.as_str(),
            data: self.data.to_value(),
            deleted: self.deleted,
        })
    }
}

/// Generate a content id.
#[must_use]
pub fn new_content_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Wire shape of a record. `locked` decides how `data` is read.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawContentItem {
    id: String,
    note_id: String,
    #[serde(rename = "type", default)]
    content_type: ContentType,
    locked: bool,
    data: Value,
    #[serde(default)]
    local_only: bool,
    date_created: i64,
    date_edited: i64,
    date_modified: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    conflicted: Option<Box<ContentItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    date_resolved: Option<i64>,
    #[serde(default)]
    deleted: bool,
    #[serde(default)]
    synced: bool,
}

impl TryFrom<RawContentItem> for ContentItem {
    type Error = String;

    fn try_from(raw: RawContentItem) -> Result<Self, Self::Error> {
        let data = match (raw.locked, raw.data) {
            (true, value) => StoredBody::Cipher(
                serde_json::from_value(value)
                    .map_err(|e| format!("locked content {} has no cipher body: {e}", raw.id))?,
            ),
            (false, Value::String(text)) => StoredBody::Plaintext(text),
            (false, Value::Null) if raw.deleted => StoredBody::Plaintext(String::new()),
            (false, other) => {
                return Err(format!(
                    "unlocked content {} must have a string body, got {other}",
                    raw.id
                ));
            }
        };

        Ok(Self {
            id: raw.id,
            note_id: raw.note_id,
            content_type: raw.content_type,
            data,
            local_only: raw.local_only,
            date_created: raw.date_created,
            date_edited: raw.date_edited,
            date_modified: raw.date_modified,
            conflicted: raw.conflicted,
            date_resolved: raw.date_resolved,
            deleted: raw.deleted,
            synced: raw.synced,
        })
    }
}

impl From<ContentItem> for RawContentItem {
    fn from(item: ContentItem) -> Self {
        Self {
            locked: item.locked(),
            data: item.data.to_value(),
            id: item.id,
            note_id: item.note_id,
            content_type: item.content_type,
            local_only: item.local_only,
            date_created: item.date_created,
            date_edited: item.date_edited,
            date_modified: item.date_modified,
            conflicted: item.conflicted,
            date_resolved: item.date_resolved,
            deleted: item.deleted,
            synced: item.synced,
        }
    }
}

/// Partial content accepted by the write path.
///
/// Everything is optional: a write either names existing content by `id`
/// or supplies the owning `note_id`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContentPatch {
    pub id: Option<String>,
    pub note_id: Option<String>,
    #[serde(rename = "type")]
    pub content_type: Option<ContentType>,
    /// Untrusted body: a string, a `{ "data": "..." }` wrapper, or a cipher.
    pub data: Option<Value>,
    pub local_only: Option<bool>,
    pub date_created: Option<i64>,
    pub date_edited: Option<i64>,
    pub conflicted: Option<Box<ContentItem>>,
    pub date_resolved: Option<i64>,
    /// Editing session; when present the write is also recorded in history.
    pub session_id: Option<String>,
    /// Set on records that came from a sync source.
    pub remote: bool,
}

impl ContentPatch {
    /// A patch creating or replacing the content of `note_id`.
    #[must_use]
    pub fn for_note(note_id: impl Into<String>) -> Self {
        Self {
            note_id: Some(note_id.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_data(mut self, data: impl Into<Value>) -> Self {
        self.data = Some(data.into());
        self
    }

    #[must_use]
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    #[must_use]
    pub const fn local_only(mut self, local_only: bool) -> Self {
        self.local_only = Some(local_only);
        self
    }
}

impl From<ContentItem> for ContentPatch {
    fn from(item: ContentItem) -> Self {
        Self {
            data: Some(item.data.to_value()),
            id: Some(item.id),
            note_id: Some(item.note_id),
            content_type: Some(item.content_type),
            local_only: Some(item.local_only),
            date_created: Some(item.date_created),
            date_edited: Some(item.date_edited),
            conflicted: item.conflicted,
            date_resolved: item.date_resolved,
            session_id: None,
            remote: false,
        }
    }
}

/// Metadata-only bulk update applied per owning note.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataUpdate {
    pub local_only: Option<bool>,
    pub date_resolved: Option<i64>,
    /// Drop the remote copy kept by a conflicted merge.
    pub clear_conflict: bool,
}
