//! Remote-origin write path.
//!
//! Records coming from a sync source never go through `add`. They are merged
//! against the local copy under a [`MergeStrategy`], and divergent edits are
//! kept side by side instead of being overwritten.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::ContentStore;
use crate::error::Result;
use crate::model::{ContentItem, ItemReference, ItemType};
use crate::storage::traits::{AttachmentBridge, HistorySink, KeyedCollection, RelationIndex};

/// Edits closer together than this are not considered divergent (one minute).
pub const DEFAULT_CONFLICT_THRESHOLD_MS: i64 = 60_000;

/// Conflict resolution strategy for merges.
///
/// When a remote record already exists locally, this determines which
/// version wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Newer timestamps win; divergent edits become conflicts.
    #[default]
    PreferNewer,
    /// Always keep the local version.
    PreferLocal,
    /// Always take the remote version.
    PreferRemote,
}

impl MergeStrategy {
    /// Get the string representation for config files and output.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PreferNewer => "prefer_newer",
            Self::PreferLocal => "prefer_local",
            Self::PreferRemote => "prefer_remote",
        }
    }
}

impl std::str::FromStr for MergeStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "prefer_newer" | "newer" => Ok(Self::PreferNewer),
            "prefer_local" | "local" => Ok(Self::PreferLocal),
            "prefer_remote" | "remote" => Ok(Self::PreferRemote),
            _ => Err(format!("Unknown merge strategy: {s}")),
        }
    }
}

/// What a merge did with a remote record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeOutcome {
    /// No local copy existed; the remote record was stored.
    Created,
    /// The remote record replaced the local one.
    Updated,
    /// The remote tombstone was applied.
    Deleted,
    /// Nothing changed locally.
    Skipped,
    /// Both sides changed; the remote copy was attached to the local record.
    Conflicted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    KeepLocal,
    TakeRemote,
    Conflict,
}

/// Pick a side under [`MergeStrategy::PreferNewer`].
fn resolve_newer(local: &ContentItem, remote: &ContentItem, threshold_ms: i64) -> Resolution {
    let newer = |remote_wins: bool| {
        if remote_wins {
            Resolution::TakeRemote
        } else {
            Resolution::KeepLocal
        }
    };

    if remote.deleted {
        return newer(remote.date_modified >= local.date_modified);
    }
    if local.deleted || local.synced {
        return newer(remote.date_modified > local.date_modified);
    }

    // Both sides have unexported changes.
    if (remote.date_edited - local.date_edited).abs() < threshold_ms {
        newer(remote.date_edited > local.date_edited)
    } else {
        Resolution::Conflict
    }
}

impl<C, A, R, H> ContentStore<C, A, R, H>
where
    C: KeyedCollection,
    A: AttachmentBridge,
    R: RelationIndex,
    H: HistorySink,
{
    /// Merge a record that came from a sync source.
    ///
    /// # Errors
    ///
    /// Returns an error if reading or writing the collection or the relation
    /// index fails.
    pub async fn merge(&self, remote: ContentItem) -> Result<MergeOutcome> {
        if remote.local_only {
            warn!(id = %remote.id, "Remote record is local-only, ignoring");
            return Ok(MergeOutcome::Skipped);
        }

        let Some(local) = self.collection.get(&remote.id).await? else {
            let outcome = if remote.deleted {
                MergeOutcome::Deleted
            } else {
                MergeOutcome::Created
            };
            self.accept_remote(remote).await?;
            return Ok(outcome);
        };

        if local.local_only {
            debug!(id = %local.id, "Local record is local-only, keeping it");
            return Ok(MergeOutcome::Skipped);
        }

        if local.fingerprint() == remote.fingerprint() {
            if !local.synced {
                self.collection.mark_synced(&[local.id]).await?;
            }
            return Ok(MergeOutcome::Skipped);
        }

        let resolution = match self.strategy {
            MergeStrategy::PreferLocal => Resolution::KeepLocal,
            MergeStrategy::PreferRemote => Resolution::TakeRemote,
            MergeStrategy::PreferNewer => {
                resolve_newer(&local, &remote, self.conflict_threshold_ms)
            }
        };

        match resolution {
            Resolution::KeepLocal => Ok(MergeOutcome::Skipped),
            Resolution::TakeRemote => {
                let outcome = if remote.deleted {
                    MergeOutcome::Deleted
                } else {
                    MergeOutcome::Updated
                };
                self.accept_remote(remote).await?;
                Ok(outcome)
            }
            Resolution::Conflict => {
                info!(id = %local.id, note_id = %local.note_id, "Divergent edits, keeping both");
                let mut local = local;
                local.conflicted = Some(Box::new(remote));
                local.date_modified = chrono::Utc::now().timestamp_millis();
                self.collection.upsert(&local).await?;
                Ok(MergeOutcome::Conflicted)
            }
        }
    }

    /// Store a remote record as-is, keeping relations in step with it.
    async fn accept_remote(&self, remote: ContentItem) -> Result<()> {
        let mut item = remote;
        item.synced = true;
        let note = ItemReference::note(&item.note_id);

        if item.deleted {
            for relation in self.relations.resolve(&note, ItemType::Attachment).await? {
                self.relations.unlink(&note, &relation).await?;
            }
        } else if !item.locked() {
            let date_modified = item.date_modified;
            let extraction = self.extract_attachments(item).await?;
            for failure in &extraction.partial_failures {
                warn!(id = %extraction.item.id, %failure, "Merged with partial failure");
            }
            item = extraction.item;
            item.date_modified = date_modified;
        }

        self.collection.upsert(&item).await?;
        debug!(id = %item.id, deleted = item.deleted, "Accepted remote content");
        Ok(())
    }
}
