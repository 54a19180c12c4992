//! Core protocol types for arclink.
//!
//! This crate holds the leaf vocabulary of the ArchiveLink protocol engine:
//!
//! - [`ParameterStore`] - ordered query parameters and the canonical
//!   string-to-sign
//! - [`CommandTemplate`] - the static (method, command) resolution table
//!   with per-template access-mode metadata
//! - [`access_mode`] - the `r/c/u/d/e` permission bitmask
//! - [`UnverifiedCommand`] / [`AuthenticatedCommand`] - the command
//!   verification state machine
//! - [`SapDocumentComponent`] / [`ContentStream`] - archived binary parts
//! - [`ArchiveError`] - the shared error taxonomy with HTTP status mapping
//!
//! Higher layers (authentication, dispatch, response serialization, the
//! document service) build exclusively on these types.

pub mod access_mode;
pub mod command;
pub mod component;
pub mod error;
pub mod params;
pub mod template;

pub use access_mode::AccessMode;
pub use command::{AuthenticatedCommand, DispatchCommand, RawRequest, UnverifiedCommand};
pub use component::{normalize_content_type, ContentStream, SapDocumentComponent};
pub use error::{ArchiveError, ArchiveResult};
pub use params::{ParameterStore, SEC_KEY};
pub use template::CommandTemplate;
