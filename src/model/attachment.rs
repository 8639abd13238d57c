//! Attachment metadata and the values exchanged with the attachment store.

use serde::{Deserialize, Serialize};

/// Mime type of saved web clips. Read back as text, not as a data URL.
pub const WEB_CLIP_MIME: &str = "application/vnd.folio.web-clip";

/// Default chunk size used when queueing a download (512 KiB).
pub const DEFAULT_CHUNK_SIZE: u64 = 512 * 1024;

/// Metadata for one content-addressed attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: String,
    /// SHA-256 of the bytes, lowercase hex.
    pub hash: String,
    pub mime_type: String,
    pub filename: Option<String>,
    pub size: u64,
    pub chunk_size: u64,
    pub date_created: i64,
    /// Whether the bytes are present on this device.
    pub local: bool,
}

impl Attachment {
    /// The form the bytes should be read back in for rendering.
    #[must_use]
    pub fn output_encoding(&self) -> OutputEncoding {
        OutputEncoding::for_mime(&self.mime_type)
    }
}

/// How attachment bytes are handed back to a renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputEncoding {
    /// `data:<mime>;base64,...` URL.
    Base64,
    /// UTF-8 text.
    Text,
    /// Raw bytes.
    Bytes,
}

impl OutputEncoding {
    #[must_use]
    pub fn for_mime(mime_type: &str) -> Self {
        if mime_type == WEB_CLIP_MIME {
            Self::Text
        } else if mime_type.starts_with("image/") {
            Self::Base64
        } else {
            Self::Bytes
        }
    }
}

/// Attachment bytes in the requested [`OutputEncoding`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentData {
    DataUrl(String),
    Text(String),
    Bytes(Vec<u8>),
}

impl AttachmentData {
    /// A value that can be inlined into a document body, if any.
    #[must_use]
    pub fn into_source(self) -> Option<String> {
        match self {
            Self::DataUrl(source) | Self::Text(source) => Some(source),
            Self::Bytes(_) => None,
        }
    }
}

/// A blob found inline in a document body, waiting to be saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineMedia {
    /// The original `src` value, used to find the element again.
    pub source: String,
    pub mime_type: String,
    pub filename: Option<String>,
    pub bytes: Vec<u8>,
}

/// One file to fetch from the remote attachment store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadRequest {
    /// Attachments are stored remotely under their hash.
    pub filename: String,
    pub chunk_size: u64,
}

/// Options passed along with a download batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DownloadOptions {
    /// Whether the downloader should read each file as soon as it lands.
    pub read_on_download: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_encoding_by_mime() {
        assert_eq!(OutputEncoding::for_mime("image/png"), OutputEncoding::Base64);
        assert_eq!(OutputEncoding::for_mime(WEB_CLIP_MIME), OutputEncoding::Text);
        assert_eq!(
            OutputEncoding::for_mime("application/pdf"),
            OutputEncoding::Bytes
        );
    }

    #[test]
    fn test_bytes_are_not_inlinable() {
        assert_eq!(AttachmentData::Bytes(vec![1, 2]).into_source(), None);
        assert_eq!(
            AttachmentData::Text("<html/>".into()).into_source(),
            Some("<html/>".into())
        );
    }
}
