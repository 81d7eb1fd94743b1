//! # surveybot-documents
//!
//! Fetches the textual content of document references and concatenates it
//! for injection into a system prompt.
//!
//! - [`DocumentSource`] - fetch one reference
//! - [`HttpSource`], [`FileSource`], [`StaticSource`] - concrete sources
//! - [`RoutingSource`] - picks HTTP or file by reference prefix
//! - [`DocumentContext`] - fetch many, skip failures, join

mod context;
mod sources;

pub use context::DocumentContext;
pub use sources::{
    DocumentError, DocumentSource, FileSource, HttpSource, RoutingSource, StaticSource,
};
