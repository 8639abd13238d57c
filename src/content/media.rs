//! Read-time media resolution and attachment removal.
//!
//! Resolution works on a copy of the item and never writes; the stored body
//! keeps only hash references.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, warn};

use super::ContentStore;
use crate::codec::ContentCodec;
use crate::error::Result;
use crate::model::{
    Attachment, ContentItem, ContentPatch, DownloadOptions, DownloadRequest, OutputEncoding,
    StoredBody,
};
use crate::storage::traits::{AttachmentBridge, HistorySink, KeyedCollection, RelationIndex};

impl<C, A, R, H> ContentStore<C, A, R, H>
where
    C: KeyedCollection,
    A: AttachmentBridge,
    R: RelationIndex,
    H: HistorySink,
{
    /// Codec and plaintext body, when the item can be rewritten at all.
    fn rewritable<'a>(&'a self, item: &'a ContentItem) -> Option<(&'a dyn ContentCodec, &'a str)> {
        let body = item.data.as_plaintext()?;
        let codec = self.codecs.get(item.content_type)?;
        Some((codec, body))
    }

    /// Inline every locally available attachment as a base64 data URL.
    ///
    /// # Errors
    ///
    /// Infallible in practice; unreadable attachments are skipped.
    pub async fn insert_media(&self, item: &ContentItem) -> Result<ContentItem> {
        let Some((codec, body)) = self.rewritable(item) else {
            return Ok(item.clone());
        };

        let mut sources = HashMap::new();
        for hash in codec.media_hashes(body) {
            match self.attachments.read(&hash, OutputEncoding::Base64).await {
                Ok(Some(data)) => {
                    if let Some(source) = data.into_source() {
                        sources.insert(hash, source);
                    }
                }
                Ok(None) => debug!(hash = %hash, "Attachment not available locally"),
                Err(e) => warn!(hash = %hash, error = %e, "Failed to read attachment"),
            }
        }

        Ok(with_body(item, codec.insert_media(body, &sources)))
    }

    /// Replace every attachment reference with `placeholder`.
    #[must_use]
    pub fn insert_placeholders(&self, item: &ContentItem, placeholder: &str) -> ContentItem {
        let Some((codec, body)) = self.rewritable(item) else {
            return item.clone();
        };
        let sources: HashMap<String, String> = codec
            .media_hashes(body)
            .into_iter()
            .map(|hash| (hash, placeholder.to_string()))
            .collect();
        with_body(item, codec.insert_media(body, &sources))
    }

    /// Queue every referenced attachment for download, then inline what can
    /// be read back.
    ///
    /// Images come back as data URLs and web clips as text; other files are
    /// queued but not inlined. With `notify`, the downloader is asked not to
    /// read files on arrival.
    ///
    /// # Errors
    ///
    /// Returns an error if an attachment lookup or the queue write fails.
    pub async fn download_media(
        &self,
        group_id: &str,
        item: &ContentItem,
        notify: bool,
    ) -> Result<ContentItem> {
        let Some((codec, body)) = self.rewritable(item) else {
            return Ok(item.clone());
        };

        let mut attachments: Vec<Attachment> = Vec::new();
        for hash in codec.media_hashes(body) {
            match self.attachments.attachment(&hash).await? {
                Some(attachment) => attachments.push(attachment),
                None => debug!(hash = %hash, "Unknown attachment, not queued"),
            }
        }

        let files: Vec<DownloadRequest> = attachments
            .iter()
            .map(|a| DownloadRequest {
                filename: a.hash.clone(),
                chunk_size: a.chunk_size,
            })
            .collect();
        let options = notify.then_some(DownloadOptions {
            read_on_download: false,
        });
        self.attachments
            .queue_downloads(&files, group_id, options)
            .await?;

        let mut sources = HashMap::new();
        for attachment in &attachments {
            match self
                .attachments
                .read(&attachment.hash, attachment.output_encoding())
                .await
            {
                Ok(Some(data)) => {
                    if let Some(source) = data.into_source() {
                        sources.insert(attachment.hash.clone(), source);
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(hash = %attachment.hash, error = %e, "Failed to read attachment"),
            }
        }

        debug!(group_id, queued = files.len(), inlined = sources.len(), "Resolved media");
        Ok(with_body(item, codec.insert_media(body, &sources)))
    }

    /// Strip the elements referencing `hashes` from live, unlocked content
    /// and write it back, which also unlinks the removed attachments.
    ///
    /// Missing, locked and codec-less content is left alone.
    ///
    /// # Errors
    ///
    /// Returns an error if the read or the write fails.
    pub async fn remove_attachments(&self, id: &str, hashes: &[String]) -> Result<()> {
        let Some(item) = self.get(id).await? else {
            return Ok(());
        };
        let Some(stripped) = self
            .rewritable(&item)
            .map(|(codec, body)| codec.remove_attachments(body, hashes))
        else {
            return Ok(());
        };

        let mut patch = ContentPatch::from(item);
        patch.data = Some(Value::String(stripped));
        self.add(patch).await?;
        Ok(())
    }
}

fn with_body(item: &ContentItem, body: String) -> ContentItem {
    let mut copy = item.clone();
    copy.data = StoredBody::Plaintext(body);
    copy
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use crate::model::attachment::WEB_CLIP_MIME;
    use crate::model::{ContentItem, ContentPatch, InlineMedia, ItemReference, ItemType, StoredBody};
    use crate::storage::SqliteStorage;

    fn save(storage: &SqliteStorage, bytes: &[u8], mime_type: &str) -> String {
        storage
            .save_attachment(&InlineMedia {
                source: String::new(),
                mime_type: mime_type.to_string(),
                filename: None,
                bytes: bytes.to_vec(),
            })
            .unwrap()
    }

    fn plain(note_id: &str, body: &str) -> ContentItem {
        let mut item = ContentItem::empty(note_id);
        item.data = StoredBody::Plaintext(body.to_string());
        item
    }

    #[tokio::test]
    async fn test_insert_media_resolves_local_images() {
        let (storage, store) = local_store();
        let hash = save(&storage, b"hello", "image/png");
        let item = plain("n1", &format!(r#"<img data-hash="{hash}"><img data-hash="gone">"#));

        let resolved = store.insert_media(&item).await.unwrap();
        assert_eq!(
            resolved.data,
            StoredBody::Plaintext(format!(
                r#"<img data-hash="{hash}" src="{HELLO_PNG}"><img data-hash="gone">"#
            ))
        );
        // The input is untouched.
        assert_eq!(item.data.as_plaintext().map(|b| b.contains("src")), Some(false));
    }

    #[test]
    fn test_insert_placeholders() {
        let (_storage, store) = local_store();
        let item = plain("n1", r#"<img data-hash="a"><img data-hash="b">"#);

        let resolved = store.insert_placeholders(&item, "/loading.svg");
        assert_eq!(
            resolved.data,
            StoredBody::Plaintext(
                r#"<img data-hash="a" src="/loading.svg"><img data-hash="b" src="/loading.svg">"#
                    .into()
            )
        );
    }

    #[tokio::test]
    async fn test_download_media_queues_and_inlines() {
        let (storage, store) = local_store();
        let image = save(&storage, b"hello", "image/png");
        let clip = save(&storage, b"<p>clip</p>", WEB_CLIP_MIME);
        let pdf = save(&storage, b"%PDF", "application/pdf");
        remote_attachment(&storage, "remote", "image/jpeg");

        let item = plain(
            "n1",
            &format!(
                r#"<img data-hash="{image}"><img data-hash="{clip}"><span data-hash="{pdf}">f</span><img data-hash="remote"><img data-hash="unknown">"#
            ),
        );

        let resolved = store.download_media("g1", &item, true).await.unwrap();

        let queued = storage.queued_downloads("g1").unwrap();
        let mut names: Vec<&str> = queued.iter().map(|q| q.filename.as_str()).collect();
        names.sort_unstable();
        let mut expected = vec![image.as_str(), clip.as_str(), pdf.as_str(), "remote"];
        expected.sort_unstable();
        assert_eq!(names, expected);
        assert!(queued.iter().all(|q| q.read_on_download == Some(false)));

        let body = resolved.data.as_plaintext().unwrap();
        assert!(body.contains(&format!(r#"<img data-hash="{image}" src="{HELLO_PNG}">"#)));
        assert!(body.contains(&format!(r#"<img data-hash="{clip}" src="<p>clip</p>">"#)));
        assert!(body.contains(&format!(r#"<span data-hash="{pdf}">"#)));
        assert!(body.contains(r#"<img data-hash="remote">"#));
    }

    #[tokio::test]
    async fn test_download_media_without_notify() {
        let (storage, store) = local_store();
        remote_attachment(&storage, "remote", "image/jpeg");
        let item = plain("n1", r#"<img data-hash="remote">"#);

        store.download_media("g2", &item, false).await.unwrap();
        let queued = storage.queued_downloads("g2").unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].read_on_download, None);
    }

    #[tokio::test]
    async fn test_resolution_leaves_locked_items() {
        let (_storage, store) = local_store();
        let mut item = ContentItem::empty("n1");
        item.data = StoredBody::Cipher(cipher("c"));

        assert_eq!(store.insert_media(&item).await.unwrap(), item);
        assert_eq!(store.insert_placeholders(&item, "x"), item);
        assert_eq!(store.download_media("g", &item, true).await.unwrap(), item);
    }

    #[tokio::test]
    async fn test_remove_attachments_strips_and_unlinks() {
        let (storage, store) = local_store();
        let id = store
            .add(ContentPatch::for_note("n1").with_data(format!(r#"<p>keep</p><img src="{HELLO_PNG}">"#)))
            .await
            .unwrap();
        let note = ItemReference::note("n1");
        assert_eq!(storage.related(&note, ItemType::Attachment).unwrap().len(), 1);

        store
            .remove_attachments(&id, &[HELLO_HASH.to_string()])
            .await
            .unwrap();

        let item = store.get(&id).await.unwrap().unwrap();
        assert_eq!(item.data, StoredBody::Plaintext("<p>keep</p>".into()));
        assert!(storage.related(&note, ItemType::Attachment).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_attachments_ignores_locked_and_missing() {
        let (_storage, store) = local_store();
        let id = store
            .add(ContentPatch::for_note("n1").with_data(cipher_value("c")))
            .await
            .unwrap();
        let before = store.get(&id).await.unwrap().unwrap();

        store.remove_attachments(&id, &["h".to_string()]).await.unwrap();
        store.remove_attachments("missing", &["h".to_string()]).await.unwrap();

        assert_eq!(store.get(&id).await.unwrap().unwrap(), before);
    }
}
