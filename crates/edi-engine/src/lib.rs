#![deny(warnings)]
#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # edi-engine
//!
//! Schema-driven decomposition of flat files and XML documents.
//!
//! Both drivers tokenize their input into a stream of tags, resolve every
//! tag against a shared [`DocumentPlug`] through the same matching rules, and
//! return a [`ParsedDocument`] holding the fragment tree, the reconstructed
//! payloads and a positioned diagnostic report.
//!
//! ## Example Usage
//!
//! ```rust
//! use edi_engine::parse_flat_file;
//! use edi_schema::{Delimiters, DocumentPlug, NodeDef};
//! use std::sync::Arc;
//!
//! let plug = DocumentPlug::new(
//!     "ABC",
//!     NodeDef::container("ROOT").children([
//!         NodeDef::segment("A1").mandatory(),
//!         NodeDef::segment("A2").mandatory(),
//!     ]),
//! )
//! .unwrap()
//! .with_delimiters(Delimiters::default());
//!
//! let doc = parse_flat_file(Some("A1*x~A2*z~".as_bytes()), Some(Arc::new(plug))).unwrap();
//! assert!(doc.is_valid());
//! assert_eq!(doc.root_fragment().children().len(), 2);
//! ```

pub mod document;
pub mod events;
pub mod flatfile;
pub mod matcher;
pub mod xml;

pub use document::{DocumentFormat, DocumentReport, ParsedDocument};
pub use flatfile::{FlatFileParser, RawSegment, SegmentReader};
pub use xml::XmlParser;

use edi_schema::DocumentPlug;
use std::io::{BufRead, BufReader, Read};
use std::sync::Arc;
use thiserror::Error;
use tracing::error;

/// Line break used by the human-formatted payloads
pub const LINE_BREAK: &str = if cfg!(windows) { "\r\n" } else { "\n" };

/// Precondition failures, raised before any parse state exists.
///
/// Problems with the document itself are never reported here; they are
/// diagnostics on the returned [`ParsedDocument`].
#[derive(Error, Debug)]
pub enum Error {
    #[error("No input stream was supplied")]
    MissingStream,

    #[error("No document plug was supplied")]
    MissingSchema,

    #[error("Input stream is empty")]
    EmptyStream,

    #[error("Document plug '{0}' declares no element or segment separators")]
    MissingDelimiters(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Parse a delimiter-based flat file.
///
/// # Errors
///
/// Fails before parsing when the stream or plug is absent, the stream is
/// empty, or the plug declares no separators.
pub fn parse_flat_file<R: Read>(
    stream: Option<R>,
    plug: Option<Arc<DocumentPlug>>,
) -> Result<ParsedDocument> {
    let (reader, plug) = preconditions(stream, plug)?;
    let parser = FlatFileParser::new(reader, plug).inspect_err(log_precondition)?;
    Ok(parser.parse())
}

/// Parse an XML document.
///
/// # Errors
///
/// Fails before parsing when the stream or plug is absent or the stream is
/// empty.
pub fn parse_xml_file<R: Read>(
    stream: Option<R>,
    plug: Option<Arc<DocumentPlug>>,
) -> Result<ParsedDocument> {
    let (reader, plug) = preconditions(stream, plug)?;
    Ok(XmlParser::new(reader, plug).parse())
}

fn preconditions<R: Read>(
    stream: Option<R>,
    plug: Option<Arc<DocumentPlug>>,
) -> Result<(BufReader<R>, Arc<DocumentPlug>)> {
    check(stream, plug).inspect_err(log_precondition)
}

fn check<R: Read>(
    stream: Option<R>,
    plug: Option<Arc<DocumentPlug>>,
) -> Result<(BufReader<R>, Arc<DocumentPlug>)> {
    let stream = stream.ok_or(Error::MissingStream)?;
    let plug = plug.ok_or(Error::MissingSchema)?;

    let mut reader = BufReader::new(stream);
    if reader.fill_buf()?.is_empty() {
        return Err(Error::EmptyStream);
    }
    Ok((reader, plug))
}

fn log_precondition(err: &Error) {
    error!(
        location = events::PRECONDITION_FAILED.location,
        event_id = events::PRECONDITION_FAILED.id,
        error = %err,
        "Parse precondition failed"
    );
}
