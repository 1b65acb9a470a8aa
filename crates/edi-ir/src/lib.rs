#![deny(warnings)]
#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # edi-ir
//!
//! Parse-tree structures for documents decomposed against a document plug.
//!
//! Every fragment is bound to the schema node it matched (or marked as
//! unrecognized / raw data) and remembers the byte span of the input it came
//! from. Fragments live in an arena ([`FragmentTree`]) and refer to their
//! parent and children by [`FragmentId`].

/// Fragment arena and binding model.
pub mod fragment;
/// Byte spans attached to fragments.
pub mod metadata;
/// Cursor-based traversal helpers for navigating fragment trees.
pub mod traversal;

pub use fragment::{Binding, Fragment, FragmentId, FragmentOutline, FragmentTree};
pub use metadata::Span;
pub use traversal::{Cursor, Traversal, walk};

use thiserror::Error;

/// Errors that can occur when building or navigating a fragment tree
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Fragment not found at path: {path}")]
    NodeNotFound { path: String },

    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Unknown fragment id {0}")]
    UnknownFragment(usize),

    #[error("Segment {segment} defines {expected} elements but {found} were supplied")]
    TooManyElements {
        segment: String,
        expected: usize,
        found: usize,
    },
}

impl Error {
    /// Build a node-not-found error with path context.
    pub fn node_not_found(path: impl Into<String>) -> Self {
        Self::NodeNotFound { path: path.into() }
    }

    /// Build an invalid-path error with input path and parsing reason.
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Crate-local result type for IR operations.
pub type Result<T> = std::result::Result<T, Error>;
