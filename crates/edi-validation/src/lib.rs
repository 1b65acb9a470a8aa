#![deny(warnings)]
#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # edi-validation
//!
//! Positioned diagnostics and their aggregation.
//!
//! Parsing never fails on document-quality problems; instead every issue
//! becomes a [`Diagnostic`] with a standardized [`ErrorCode`], a byte span
//! and a [`Severity`], collected per transaction set in
//! [`InterchangeErrors`].
//!
//! ## Example Usage
//!
//! ```rust
//! use edi_validation::{ErrorCode, InterchangeErrors, Severity, ValidationReporter};
//!
//! let mut errors = InterchangeErrors::new();
//! errors.add_transaction_set(1, "850", "0001", true);
//! errors.add_segment_error(
//!     "BEG",
//!     ErrorCode::MandatorySegmentMissing,
//!     ErrorCode::MandatorySegmentMissing.description(),
//!     1,
//!     0,
//!     9,
//!     Severity::Error,
//! );
//!
//! assert!(!errors.is_valid());
//! let report = ValidationReporter::new().report(&errors);
//! assert_eq!(report.error_count, 1);
//! ```

pub mod errors;
pub mod reporter;

pub use errors::{Diagnostic, ErrorCode, InterchangeErrors, Severity, TransactionSetErrors};
pub use reporter::{TransactionSetReport, ValidationIssue, ValidationReport, ValidationReporter};

use thiserror::Error;

/// Errors raised by the validation types themselves
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Unknown error code: {0}")]
    UnknownErrorCode(String),
}

pub type Result<T> = std::result::Result<T, Error>;
