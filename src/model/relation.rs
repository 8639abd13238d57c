//! References used by the relation index.

use serde::{Deserialize, Serialize};

/// Kinds of items that can be linked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Note,
    Attachment,
}

impl ItemType {
    /// Get the string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Note => "note",
            Self::Attachment => "attachment",
        }
    }

    /// Parse from the stored string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "note" => Some(Self::Note),
            "attachment" => Some(Self::Attachment),
            _ => None,
        }
    }
}

/// A typed pointer to an item on one side of a relation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemReference {
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub id: String,
}

impl ItemReference {
    #[must_use]
    pub fn note(id: impl Into<String>) -> Self {
        Self {
            item_type: ItemType::Note,
            id: id.into(),
        }
    }

    #[must_use]
    pub fn attachment(id: impl Into<String>) -> Self {
        Self {
            item_type: ItemType::Attachment,
            id: id.into(),
        }
    }
}
