//! Archived document components and their data streams.
//!
//! A component is one named binary part of an archived document (`data`,
//! `data1`, ...). Component content is either an in-memory buffer or a
//! file-backed stream extracted into a temporary location by the storage
//! backend; the response writer takes ownership of the stream and deletes
//! the backing file after serving it.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::debug;

/// Content bytes of a component, in memory or file-backed.
#[derive(Debug, Clone)]
pub enum ContentStream {
    /// Fully buffered content.
    Bytes(Bytes),
    /// Content extracted to a temporary file owned by this stream.
    TempFile(PathBuf),
}

impl ContentStream {
    /// Creates an empty in-memory stream.
    #[must_use]
    pub fn empty() -> Self {
        Self::Bytes(Bytes::new())
    }

    /// Returns the backing temp-file path, if any.
    #[must_use]
    pub fn temp_path(&self) -> Option<&Path> {
        match self {
            Self::Bytes(_) => None,
            Self::TempFile(path) => Some(path.as_path()),
        }
    }

    /// Reads the whole stream into memory.
    pub async fn read_all(&self) -> std::io::Result<Bytes> {
        match self {
            Self::Bytes(bytes) => Ok(bytes.clone()),
            Self::TempFile(path) => Ok(Bytes::from(tokio::fs::read(path).await?)),
        }
    }

    /// Deletes the backing temp file, if any. Failures are swallowed; a
    /// leaked temp file must never fail a response that already streamed.
    pub fn cleanup(&self) {
        if let Self::TempFile(path) = self {
            if let Err(err) = std::fs::remove_file(path) {
                debug!(path = %path.display(), error = %err, "temp file cleanup failed");
            }
        }
    }
}

impl From<Bytes> for ContentStream {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<Vec<u8>> for ContentStream {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(bytes))
    }
}

/// One archived binary part of a document.
#[derive(Debug, Clone)]
pub struct SapDocumentComponent {
    /// Component id (`data`, `data1`, `attr`, ...).
    pub comp_id: String,
    /// MIME type, possibly with parameters.
    pub content_type: String,
    /// Character set, when the content is textual.
    pub charset: Option<String>,
    /// Application version of the component format.
    pub version: Option<String>,
    /// True content length in bytes.
    pub content_length: u64,
    /// Creation timestamp (UTC).
    pub creation_date: DateTime<Utc>,
    /// Last-modified timestamp (UTC).
    pub modified_date: DateTime<Utc>,
    /// Component status (`online`).
    pub status: String,
    /// Protocol version the component was stored under.
    pub p_version: String,
    /// Original file name, when known.
    pub file_name: Option<String>,
    /// Content, present when the component was extracted with data.
    pub data: Option<ContentStream>,
}

impl SapDocumentComponent {
    /// Returns the base content type: the substring before `;`, trimmed and
    /// lower-cased. This is the key into the strategy registries.
    #[must_use]
    pub fn base_content_type(&self) -> String {
        normalize_content_type(&self.content_type)
    }
}

/// Normalizes a MIME type for registry lookup: substring before `;`,
/// trimmed, ASCII lower-cased.
#[must_use]
pub fn normalize_content_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}
