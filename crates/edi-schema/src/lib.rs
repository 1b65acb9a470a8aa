#![deny(warnings)]
#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # edi-schema
//!
//! Schema model, delimiter configuration, and traversal cursor for
//! document plugs.
//!
//! A [`DocumentPlug`] is the declarative description of one document type:
//! an ordered tree of [`SchemaNode`]s ("pluglets") plus the separator codes
//! used by flat-file serializations. Plugs are immutable once built and are
//! meant to be shared (`Arc<DocumentPlug>`) across many parses; all per-parse
//! state lives in a [`SchemaCursor`] / [`OccurrenceTable`] owned by the parse.

pub mod cursor;
pub mod delimiters;
pub mod loader;
pub mod model;
pub mod registry;

pub use cursor::{MissingNode, OccurrenceTable, Outcome, Resolution, SchemaCursor, StartCandidate};
pub use delimiters::Delimiters;
pub use loader::SchemaLoader;
pub use model::{DocumentPlug, NodeDef, NodeKind, SchemaNode, SchemaNodeId, UNBOUNDED};
pub use registry::PlugRegistry;

use thiserror::Error;

/// Errors that can occur when building or loading document plugs
#[derive(Error, Debug)]
pub enum Error {
    #[error("Schema not found: {0}")]
    NotFound(String),

    #[error("Invalid schema format: {0}")]
    InvalidFormat(String),

    #[error("Invalid node '{path}': {reason}")]
    InvalidNode { path: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build an invalid-node error with the node's schema path.
    pub fn invalid_node(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidNode {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
