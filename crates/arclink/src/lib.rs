//! # arclink
//!
//! **SAP ArchiveLink content-server protocol engine**
//!
//! arclink implements the HTTP content-server interface SAP systems use to
//! archive and retrieve documents:
//!
//! - **Command dispatch** – the first query token selects the command
//!   (`get`, `create`, `docGet`, `info`, ...), resolved against the HTTP
//!   method
//! - **Signed URLs** – `secKey` carries a detached CMS signature over the
//!   canonical request URL, verified against the per-repository certificate
//! - **Document storage seam** – backends implement
//!   [`service::ContentRepository`]; the engine never touches a database
//!   directly
//! - **Content strategies** – text extraction and append for plain text,
//!   PDF and the OOXML formats
//! - **Access counters** – per-repository create/delete/update/view counts
//!   with periodic flushing
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use arclink::prelude::*;
//!
//! async fn serve(repository: Arc<dyn ContentRepository>) {
//!     let counters = CounterService::new();
//!     let service = Arc::new(DocumentService::new(Arc::clone(&repository), counters));
//!     let registry = handler_registry(service).expect("duplicate handler");
//!     let dispatcher = Dispatcher::new(Arc::new(RepositoryEnv::new(repository)), registry);
//!
//!     // For each incoming HTTP request:
//!     // let response = dispatcher.dispatch(raw_request).await;
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! RawRequest → parse → feature gate → certificate → signature → handler
//!                                                                  ↓
//! wire bytes ← ResponseWriter ← CommandResponse ← DocumentService ←┘
//! ```

#![doc(html_root_url = "https://docs.rs/arclink/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export the protocol vocabulary
pub use arclink_core as core;

// Re-export authentication and signature verification
pub use arclink_auth as auth;

// Re-export dispatch and response serialization
pub use arclink_protocol as protocol;

// Re-export the document service and storage seam
pub use arclink_service as service;

// Re-export access counters
pub use arclink_counter as counter;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust,ignore
/// use arclink::prelude::*;
/// ```
pub mod prelude {
    pub use arclink_core::{
        ArchiveError, ArchiveResult, CommandTemplate, ContentStream, DispatchCommand,
        ParameterStore, RawRequest, SapDocumentComponent,
    };

    // Re-export the signature layer
    pub use arclink_auth::{ArchiveCertificate, RequestAuthenticator};

    // Re-export dispatch and response types
    pub use arclink_protocol::{
        CommandHandler, CommandResponse, DispatchEnv, Dispatcher, HandlerRegistry, ResponseBody,
        ResponseWriter,
    };

    // Re-export the document service and its collaborators
    pub use arclink_service::{
        handler_registry, ContentRepository, DocumentService, RecordHandle, RepositoryCounterStore,
        RepositoryEnv,
    };

    // Re-export access counters
    pub use arclink_counter::{CounterCache, CounterFlusher, CounterKind, CounterService};
}
