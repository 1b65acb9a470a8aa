//! Diagnostic model and the interchange-level aggregator

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::trace;

/// Standardized classification of a document-quality issue.
///
/// Codes mirror the X12 997 AK304 segment syntax error codes where one
/// exists; the remaining variants cover failures that have no X12
/// counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Unrecognized segment ID (X12 code 1)
    #[serde(alias = "UnrecognizedSegmentID")]
    UnrecognizedSegment,
    /// Unexpected segment (X12 code 2)
    UnexpectedSegment,
    /// Mandatory segment missing (X12 code 3)
    MandatorySegmentMissing,
    /// Loop occurs over maximum times (X12 code 4)
    LoopOccursOverMaximumTimes,
    /// Segment exceeds maximum use (X12 code 5)
    SegmentExceedsMaximumUse,
    /// The document root does not match the schema root
    InvalidRootNode,
    /// A fragment could not be built from the matched node and its values
    DocumentFragmentCreation,
    /// Unexpected failure inside the parser
    InternalError,
}

impl ErrorCode {
    pub const ALL: [Self; 8] = [
        Self::UnrecognizedSegment,
        Self::UnexpectedSegment,
        Self::MandatorySegmentMissing,
        Self::LoopOccursOverMaximumTimes,
        Self::SegmentExceedsMaximumUse,
        Self::InvalidRootNode,
        Self::DocumentFragmentCreation,
        Self::InternalError,
    ];

    /// X12 AK304 code, if the issue has one
    pub fn code(self) -> Option<u8> {
        match self {
            Self::UnrecognizedSegment => Some(1),
            Self::UnexpectedSegment => Some(2),
            Self::MandatorySegmentMissing => Some(3),
            Self::LoopOccursOverMaximumTimes => Some(4),
            Self::SegmentExceedsMaximumUse => Some(5),
            Self::InvalidRootNode | Self::DocumentFragmentCreation | Self::InternalError => None,
        }
    }

    /// Fixed standard description
    pub fn description(self) -> &'static str {
        match self {
            Self::UnrecognizedSegment => "Unrecognized segment ID",
            Self::UnexpectedSegment => "Unexpected segment",
            Self::MandatorySegmentMissing => "Mandatory segment missing",
            Self::LoopOccursOverMaximumTimes => "Loop occurs over maximum times",
            Self::SegmentExceedsMaximumUse => "Segment exceeds maximum use",
            Self::InvalidRootNode => "Invalid root node",
            Self::DocumentFragmentCreation => "Document fragment creation failed",
            Self::InternalError => "Internal parser error",
        }
    }

    /// Name used in serialized reports
    pub fn name(self) -> &'static str {
        match self {
            Self::UnrecognizedSegment => "UnrecognizedSegment",
            Self::UnexpectedSegment => "UnexpectedSegment",
            Self::MandatorySegmentMissing => "MandatorySegmentMissing",
            Self::LoopOccursOverMaximumTimes => "LoopOccursOverMaximumTimes",
            Self::SegmentExceedsMaximumUse => "SegmentExceedsMaximumUse",
            Self::InvalidRootNode => "InvalidRootNode",
            Self::DocumentFragmentCreation => "DocumentFragmentCreation",
            Self::InternalError => "InternalError",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code() {
            Some(code) => write!(f, "{code} {}", self.description()),
            None => f.write_str(self.description()),
        }
    }
}

impl FromStr for ErrorCode {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        if s.eq_ignore_ascii_case("UnrecognizedSegmentID") {
            return Ok(Self::UnrecognizedSegment);
        }

        Self::ALL
            .into_iter()
            .find(|code| {
                code.name().eq_ignore_ascii_case(s)
                    || code.code().is_some_and(|n| n.to_string() == s)
            })
            .ok_or_else(|| crate::Error::UnknownErrorCode(s.to_string()))
    }
}

/// Severity of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Issue on an ignorable node; does not invalidate the document
    Warning,
    /// Document is invalid
    Error,
}

impl Severity {
    /// `Warning` when the offending schema node is ignorable, else `Error`
    pub fn for_ignorable(is_ignorable: bool) -> Self {
        if is_ignorable {
            Self::Warning
        } else {
            Self::Error
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => f.write_str("Warning"),
            Self::Error => f.write_str("Error"),
        }
    }
}

/// One positioned document-quality issue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Segment or element tag the issue is about
    pub tag: String,
    pub code: ErrorCode,
    pub description: String,
    /// 1-based count of segments/elements from the document start
    pub sequence_number: u32,
    pub start_offset: u64,
    /// Inclusive end offset
    pub end_offset: u64,
    pub severity: Severity,
}

/// Diagnostics grouped under one transaction set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSetErrors {
    pub sequence: u32,
    pub type_tag: String,
    pub control_number: String,
    pub is_valid: bool,
    pub diagnostics: Vec<Diagnostic>,
}

impl TransactionSetErrors {
    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

/// Append-only aggregator of diagnostics for one interchange
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterchangeErrors {
    transaction_sets: Vec<TransactionSetErrors>,
}

impl InterchangeErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new transaction-set context; later diagnostics land in it.
    pub fn add_transaction_set(
        &mut self,
        sequence: u32,
        type_tag: impl Into<String>,
        control_number: impl Into<String>,
        is_valid: bool,
    ) {
        let context = TransactionSetErrors {
            sequence,
            type_tag: type_tag.into(),
            control_number: control_number.into(),
            is_valid,
            diagnostics: Vec::new(),
        };
        trace!(
            sequence,
            type_tag = %context.type_tag,
            "Opened transaction set context"
        );
        self.transaction_sets.push(context);
    }

    /// Record a segment or element diagnostic in the current context.
    ///
    /// A synthetic context is opened if none exists yet.
    #[allow(clippy::too_many_arguments)]
    pub fn add_segment_error(
        &mut self,
        tag: impl Into<String>,
        code: ErrorCode,
        description: impl Into<String>,
        sequence_number: u32,
        start_offset: u64,
        end_offset: u64,
        severity: Severity,
    ) {
        self.add_diagnostic(Diagnostic {
            tag: tag.into(),
            code,
            description: description.into(),
            sequence_number,
            start_offset,
            end_offset,
            severity,
        });
    }

    /// Record an unrecoverable construction failure; always an `Error`.
    pub fn add_generic_error(
        &mut self,
        tag: impl Into<String>,
        code: ErrorCode,
        description: impl Into<String>,
        sequence_number: u32,
        start_offset: u64,
        end_offset: u64,
    ) {
        self.add_segment_error(
            tag,
            code,
            description,
            sequence_number,
            start_offset,
            end_offset,
            Severity::Error,
        );
    }

    /// Record a prepared diagnostic in the current context.
    ///
    /// A synthetic context is opened if none exists yet.
    pub fn add_diagnostic(&mut self, diagnostic: Diagnostic) {
        if self.transaction_sets.is_empty() {
            self.add_transaction_set(0, "", "", true);
        }

        let last = self.transaction_sets.len() - 1;
        let context = &mut self.transaction_sets[last];
        if diagnostic.severity == Severity::Error {
            context.is_valid = false;
        }
        context.diagnostics.push(diagnostic);
    }

    /// True iff no diagnostic in any context is an `Error`
    pub fn is_valid(&self) -> bool {
        self.error_count() == 0
    }

    pub fn error_count(&self) -> usize {
        self.transaction_sets
            .iter()
            .map(TransactionSetErrors::error_count)
            .sum()
    }

    pub fn warning_count(&self) -> usize {
        self.transaction_sets
            .iter()
            .map(TransactionSetErrors::warning_count)
            .sum()
    }

    /// Total number of diagnostics across contexts
    pub fn len(&self) -> usize {
        self.transaction_sets.iter().map(|ts| ts.diagnostics.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn transaction_sets(&self) -> &[TransactionSetErrors] {
        &self.transaction_sets
    }

    /// Every diagnostic in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.transaction_sets
            .iter()
            .flat_map(|ts| ts.diagnostics.iter())
    }

    /// Diagnostics carrying the given code
    pub fn with_code(&self, code: ErrorCode) -> impl Iterator<Item = &Diagnostic> {
        self.iter().filter(move |d| d.code == code)
    }
}
