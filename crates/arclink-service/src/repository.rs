//! Storage collaborator traits.
//!
//! The protocol engine never talks to a database or filesystem directly;
//! everything goes through [`ContentRepository`] and the per-record
//! [`RecordHandle`]. Implementations live outside this workspace (SQL,
//! object store, in-memory for tests).
//!
//! Two adapters bridge the repository into the other crates' seams:
//! [`RepositoryEnv`] implements the dispatcher's environment trait and
//! [`RepositoryCounterStore`] the counter flusher's store trait.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use arclink_auth::ArchiveCertificate;
use arclink_core::{ArchiveResult, ContentStream, SapDocumentComponent};
use arclink_counter::{CounterSnapshot, CounterStore};
use arclink_protocol::DispatchEnv;

/// A new record to be created, with its initial components.
#[derive(Debug)]
pub struct NewRecord {
    /// Content repository the record belongs to.
    pub cont_rep: String,
    /// Document id.
    pub doc_id: String,
    /// Protocol version the record is stored under.
    pub p_version: String,
    /// Initial components, at least one.
    pub components: Vec<SapDocumentComponent>,
}

/// A certificate uploaded through `putCert`.
#[derive(Debug)]
pub struct CertificateUpload {
    /// Raw DER bytes as received.
    pub der: Vec<u8>,
    /// Authentication id of the installing system.
    pub auth_id: String,
    /// Granted permission bitmask.
    pub permissions: u32,
}

/// One repository's row in the `serverInfo` listing.
#[derive(Debug, Clone)]
pub struct RepositoryInfo {
    /// Repository name.
    pub cont_rep: String,
    /// Whether the repository accepts requests.
    pub enabled: bool,
    /// Protocol version the repository speaks.
    pub p_version: String,
    /// Number of stored documents, when the backend tracks it.
    pub document_count: Option<u64>,
}

/// The storage backend for archived documents.
#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// Looks up a record, returning a handle when it exists.
    async fn get_record(
        &self,
        cont_rep: &str,
        doc_id: &str,
    ) -> ArchiveResult<Option<Box<dyn RecordHandle>>>;

    /// Creates a record with its initial components.
    async fn create_record(&self, record: NewRecord) -> ArchiveResult<Box<dyn RecordHandle>>;

    /// Persists a repository certificate installed through `putCert`.
    async fn save_certificate(
        &self,
        cont_rep: &str,
        upload: CertificateUpload,
    ) -> ArchiveResult<()>;

    /// Returns the certificate on file for a repository.
    async fn archive_certificate(
        &self,
        cont_rep: &str,
    ) -> ArchiveResult<Option<ArchiveCertificate>>;

    /// Whether the content-server feature is activated.
    async fn feature_activated(&self) -> bool;

    /// Whether the backend is reachable and initialized.
    async fn is_initialized(&self) -> bool;

    /// Lists repositories for `serverInfo`, optionally narrowed to one.
    async fn server_info(&self, cont_rep: Option<&str>) -> ArchiveResult<Vec<RepositoryInfo>>;

    /// Persists accumulated access counters additively.
    async fn save_counters(&self, cont_rep: &str, snapshot: CounterSnapshot) -> ArchiveResult<()>;
}

/// A loaded record and its mutation surface.
#[async_trait]
pub trait RecordHandle: Send + Sync {
    /// Creation timestamp of the record.
    fn date_created(&self) -> DateTime<Utc>;

    /// Last-modified timestamp of the record.
    fn date_modified(&self) -> DateTime<Utc>;

    /// Number of components in the record.
    fn component_count(&self) -> usize;

    /// Lists component metadata, without content.
    async fn all_components(&self) -> ArchiveResult<Vec<SapDocumentComponent>>;

    /// Finds one component's metadata, without content.
    async fn find_component(&self, comp_id: &str)
        -> ArchiveResult<Option<SapDocumentComponent>>;

    /// Whether a component with the id exists.
    async fn has_component(&self, comp_id: &str) -> ArchiveResult<bool>;

    /// Extracts one component, with content when `with_content` is set.
    async fn extract_component(
        &self,
        comp_id: &str,
        with_content: bool,
    ) -> ArchiveResult<Option<SapDocumentComponent>>;

    /// Extracts all components with content.
    async fn extract_all(&self) -> ArchiveResult<Vec<SapDocumentComponent>>;

    /// Adds a component. The id must not already exist.
    async fn add_component(&mut self, component: SapDocumentComponent) -> ArchiveResult<()>;

    /// Replaces a component's content and metadata. The id must exist.
    async fn update_component(&mut self, component: SapDocumentComponent) -> ArchiveResult<()>;

    /// Deletes one component.
    async fn delete_component(&mut self, comp_id: &str) -> ArchiveResult<()>;

    /// Deletes the whole record.
    async fn delete_record(&mut self) -> ArchiveResult<()>;

    /// Flushes pending mutations to the backend.
    async fn save(&mut self) -> ArchiveResult<()>;

    /// Stamps the record's last-modified time.
    fn set_metadata(&mut self, modified: DateTime<Utc>);
}

/// Replaces a component's content stream, when present, with fresh bytes.
pub(crate) fn with_content(
    mut component: SapDocumentComponent,
    data: bytes::Bytes,
) -> SapDocumentComponent {
    component.content_length = data.len() as u64;
    component.data = Some(ContentStream::from(data));
    component
}

/// [`DispatchEnv`] over a [`ContentRepository`].
pub struct RepositoryEnv {
    repository: Arc<dyn ContentRepository>,
}

impl RepositoryEnv {
    /// Wraps a repository.
    #[must_use]
    pub fn new(repository: Arc<dyn ContentRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl DispatchEnv for RepositoryEnv {
    async fn feature_activated(&self) -> bool {
        self.repository.feature_activated().await
    }

    async fn certificate(&self, cont_rep: &str) -> ArchiveResult<Option<ArchiveCertificate>> {
        self.repository.archive_certificate(cont_rep).await
    }
}

/// [`CounterStore`] over a [`ContentRepository`].
pub struct RepositoryCounterStore {
    repository: Arc<dyn ContentRepository>,
}

impl RepositoryCounterStore {
    /// Wraps a repository.
    #[must_use]
    pub fn new(repository: Arc<dyn ContentRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl CounterStore for RepositoryCounterStore {
    async fn is_initialized(&self) -> bool {
        self.repository.is_initialized().await
    }

    async fn save_counters(
        &self,
        cont_rep: &str,
        snapshot: CounterSnapshot,
    ) -> ArchiveResult<()> {
        self.repository.save_counters(cont_rep, snapshot).await
    }
}
