//! The ArchiveLink document service.
//!
//! This crate turns dispatched commands into repository operations:
//!
//! - [`DocumentService`] - the command implementations (`get`, `create`,
//!   `update`, `append`, `delete`, `search`, `info`, `serverInfo`,
//!   `putCert`)
//! - [`ContentRepository`] / [`RecordHandle`] - the storage seam; backends
//!   live outside this workspace
//! - [`ExtractorRegistry`] / [`AppenderRegistry`] - content-type-keyed
//!   strategies for text extraction and document append
//! - [`match_pattern`] - the offset/length/literal search matcher
//!
//! [`handler_registry`] builds the dispatcher registry over one shared
//! service instance.

pub mod append;
pub mod document;
pub mod extract;
pub mod multipart;
mod ooxml;
mod pdf;
pub mod repository;
pub mod search;

pub use append::{AppenderRegistry, DocumentAppender};
pub use document::{handler_registry, DocumentService};
pub use extract::{ExtractorRegistry, TextExtractor};
pub use multipart::{boundary_from_content_type, parse_multipart, BodyPart};
pub use repository::{
    CertificateUpload, ContentRepository, NewRecord, RecordHandle, RepositoryCounterStore,
    RepositoryEnv, RepositoryInfo,
};
pub use search::match_pattern;
