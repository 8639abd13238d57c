//! Write-time attachment extraction and relation reconciliation.

use std::collections::HashMap;

use tracing::debug;

use super::{ContentStore, PartialFailure};
use crate::codec::Extracted;
use crate::error::Result;
use crate::model::{ContentItem, ItemReference, ItemType, StoredBody};
use crate::storage::traits::{AttachmentBridge, HistorySink, KeyedCollection, RelationIndex};

/// An item after extraction, with the failures that were tolerated on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub item: ContentItem,
    pub partial_failures: Vec<PartialFailure>,
}

impl Extraction {
    fn unchanged(item: ContentItem) -> Self {
        Self {
            item,
            partial_failures: Vec::new(),
        }
    }
}

impl<C, A, R, H> ContentStore<C, A, R, H>
where
    C: KeyedCollection,
    A: AttachmentBridge,
    R: RelationIndex,
    H: HistorySink,
{
    /// Move inline media into the attachment store and make the note's
    /// attachment relations match the hashes the body references.
    ///
    /// Local-only, locked and codec-less items come back unchanged. The
    /// result is not persisted; [`add`](Self::add) does that.
    ///
    /// # Errors
    ///
    /// Returns an error if the relation index or an attachment lookup fails.
    /// Failed blob saves are reported as partial failures instead.
    pub async fn extract_attachments(&self, mut item: ContentItem) -> Result<Extraction> {
        if item.local_only {
            return Ok(Extraction::unchanged(item));
        }
        let Some(codec) = self.codecs.get(item.content_type) else {
            return Ok(Extraction::unchanged(item));
        };
        let StoredBody::Plaintext(body) = &item.data else {
            return Ok(Extraction::unchanged(item));
        };

        let mut partial_failures = Vec::new();
        let mut saved = HashMap::new();
        for media in codec.inline_media(body) {
            match self.attachments.save(&media).await {
                Ok(hash) => {
                    saved.insert(media.source, hash);
                }
                Err(e) => {
                    debug!(mime_type = %media.mime_type, error = %e, "Inline media not saved");
                    partial_failures.push(PartialFailure::AttachmentNotSaved {
                        mime_type: media.mime_type,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let Extracted { data, hashes } = codec.extract_attachments(body, &saved);

        let note = ItemReference::note(&item.note_id);
        let linked = self.relations.resolve(&note, ItemType::Attachment).await?;

        let to_delete: Vec<&ItemReference> =
            linked.iter().filter(|r| !hashes.contains(&r.id)).collect();
        let mut to_add: Vec<&String> = Vec::new();
        for hash in &hashes {
            if !hash.is_empty() && !linked.iter().any(|r| &r.id == hash) && !to_add.contains(&hash)
            {
                to_add.push(hash);
            }
        }

        for relation in &to_delete {
            self.relations.unlink(&note, relation).await?;
        }

        for hash in &to_add {
            if self.attachments.attachment(hash).await?.is_some() {
                self.relations
                    .add(&note, &ItemReference::attachment(hash.as_str()))
                    .await?;
            } else {
                debug!(hash = %hash, note_id = %item.note_id, "Referenced attachment does not exist");
                partial_failures.push(PartialFailure::AttachmentMissing {
                    hash: (*hash).clone(),
                });
            }
        }

        debug!(
            note_id = %item.note_id,
            saved = saved.len(),
            unlinked = to_delete.len(),
            added = to_add.len(),
            "Reconciled attachments"
        );

        if !to_add.is_empty() {
            item.date_modified = chrono::Utc::now().timestamp_millis();
        }
        item.data = StoredBody::Plaintext(data);

        Ok(Extraction {
            item,
            partial_failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::test_support::*;
    use crate::codec::CodecRegistry;
    use crate::content::ContentStore;
    use crate::model::{ContentPatch, ItemReference, ItemType, StoredBody};
    use crate::storage::SqliteStorage;

    fn attachments_of(storage: &SqliteStorage, note_id: &str) -> Vec<String> {
        let mut ids: Vec<String> = storage
            .related(&ItemReference::note(note_id), ItemType::Attachment)
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        ids.sort();
        ids
    }

    #[tokio::test]
    async fn test_format_without_codec_is_stored_verbatim() {
        let storage = Arc::new(SqliteStorage::open_memory().unwrap());
        let store = ContentStore::new(
            Arc::clone(&storage),
            Arc::clone(&storage),
            Arc::clone(&storage),
            Arc::clone(&storage),
            CodecRegistry::new(),
        );

        let body = format!(r#"<p>x</p><img src="{HELLO_PNG}">"#);
        let id = store
            .add(ContentPatch::for_note("n1").with_data(body.clone()))
            .await
            .unwrap();

        let item = store.get(&id).await.unwrap().unwrap();
        assert_eq!(item.data, StoredBody::Plaintext(body));
        assert!(attachments_of(&storage, "n1").is_empty());
        assert!(storage.list_attachments().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_inline_image_is_saved_and_linked() {
        let (storage, store) = local_store();
        let id = store
            .add(ContentPatch::for_note("n1").with_data(format!(r#"<p>x</p><img src="{HELLO_PNG}">"#)))
            .await
            .unwrap();

        let item = store.get(&id).await.unwrap().unwrap();
        assert_eq!(
            item.data,
            StoredBody::Plaintext(format!(r#"<p>x</p><img data-hash="{HELLO_HASH}">"#))
        );
        assert_eq!(attachments_of(&storage, "n1"), vec![HELLO_HASH.to_string()]);
        assert!(storage.get_attachment(HELLO_HASH).unwrap().unwrap().local);
    }

    #[tokio::test]
    async fn test_reconciles_relations_with_body() {
        let (storage, store) = local_store();
        remote_attachment(&storage, "a", "image/png");
        remote_attachment(&storage, "b", "image/png");
        remote_attachment(&storage, "c", "image/png");
        let note = ItemReference::note("n1");
        storage.link(&note, &ItemReference::attachment("a")).unwrap();
        storage.link(&note, &ItemReference::attachment("c")).unwrap();

        store
            .add(ContentPatch::for_note("n1").with_data(r#"<img data-hash="a"><img data-hash="b">"#))
            .await
            .unwrap();

        assert_eq!(attachments_of(&storage, "n1"), vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_attachment_is_skipped() {
        let (storage, store) = local_store();
        remote_attachment(&storage, "a", "image/png");
        remote_attachment(&storage, "c", "image/png");
        let note = ItemReference::note("n1");
        storage.link(&note, &ItemReference::attachment("a")).unwrap();
        storage.link(&note, &ItemReference::attachment("c")).unwrap();

        let report = store
            .add_with_report(
                ContentPatch::for_note("n1").with_data(r#"<img data-hash="a"><img data-hash="b">"#),
            )
            .await
            .unwrap();

        assert_eq!(attachments_of(&storage, "n1"), vec!["a".to_string()]);
        assert_eq!(
            report.partial_failures,
            vec![super::PartialFailure::AttachmentMissing { hash: "b".into() }]
        );
    }

    #[tokio::test]
    async fn test_extraction_is_idempotent() {
        let (storage, store) = local_store();
        let id = store
            .add(ContentPatch::for_note("n1").with_data(format!(
                r#"<img src="{HELLO_PNG}"><span class="attachment" data-hash="{HELLO_HASH}">f</span>"#
            )))
            .await
            .unwrap();
        let first = store.get(&id).await.unwrap().unwrap();
        let relations = attachments_of(&storage, "n1");

        let again = store.extract_attachments(first.clone()).await.unwrap();
        assert_eq!(again.item.data, first.data);
        assert!(again.partial_failures.is_empty());
        assert_eq!(attachments_of(&storage, "n1"), relations);
    }

    #[tokio::test]
    async fn test_local_only_content_is_left_alone() {
        let (storage, store) = local_store();
        remote_attachment(&storage, "a", "image/png");
        let body = format!(r#"<img src="{HELLO_PNG}"><img data-hash="a">"#);
        let id = store
            .add(ContentPatch::for_note("n1").with_data(body.clone()).local_only(true))
            .await
            .unwrap();

        let item = store.get(&id).await.unwrap().unwrap();
        assert_eq!(item.data, StoredBody::Plaintext(body));
        assert!(attachments_of(&storage, "n1").is_empty());
        assert!(storage.get_attachment(HELLO_HASH).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_locked_item_is_not_parsed() {
        let (_storage, store) = local_store();
        let mut item = crate::model::ContentItem::empty("n1");
        item.local_only = false;
        item.data = StoredBody::Cipher(cipher("x"));

        let out = store.extract_attachments(item.clone()).await.unwrap();
        assert_eq!(out.item, item);
    }
}
