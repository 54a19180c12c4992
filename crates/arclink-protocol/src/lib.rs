//! Response model, wire serialization and dispatch for arclink.
//!
//! This crate sits between the authentication layer and the document
//! service:
//!
//! - [`CommandResponse`] - the five exclusive response shapes and the
//!   uniform protocol error format
//! - [`ResponseWriter`] - multipart framing and body streaming onto an
//!   async sink
//! - [`resolve_range`] - the byte-range rule for single-document reads
//! - [`Dispatcher`] / [`HandlerRegistry`] - orchestration from raw request
//!   to response, with handlers registered once at startup

pub mod dispatcher;
pub mod range;
pub mod response;
pub mod writer;

pub use dispatcher::{
    CommandHandler, DispatchEnv, Dispatcher, HandlerRegistry, HandlerRegistryBuilder,
};
pub use range::resolve_range;
pub use response::{disposition_for, CommandResponse, Disposition, ResponseBody};
pub use writer::ResponseWriter;
