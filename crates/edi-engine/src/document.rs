//! Parse result

use chrono::{DateTime, Utc};
use edi_ir::{Fragment, FragmentOutline, FragmentTree};
use edi_schema::DocumentPlug;
use edi_validation::{InterchangeErrors, ValidationReport, ValidationReporter};
use serde::Serialize;
use std::sync::Arc;

/// Serialization the document was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    FlatFile,
    Xml,
}

/// A document decomposed against its plug.
///
/// Always produced once preconditions hold, valid or not; check
/// [`ParsedDocument::is_valid`].
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub schema: Arc<DocumentPlug>,
    pub format: DocumentFormat,
    pub tree: FragmentTree,
    /// Raw reconstruction of the input
    pub original_payload: String,
    /// Reconstruction with one segment per line, or indented XML
    pub beautified_payload: String,
    /// Construction failures, kept apart from the diagnostics
    pub structural_errors: Option<Vec<String>>,
    pub diagnostics: InterchangeErrors,
    pub parsed_at: DateTime<Utc>,
}

/// Serializable view of a [`ParsedDocument`]
#[derive(Debug, Clone, Serialize)]
pub struct DocumentReport {
    pub schema: String,
    pub format: DocumentFormat,
    pub parsed_at: DateTime<Utc>,
    pub validation: ValidationReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structural_errors: Option<Vec<String>>,
    pub fragments: FragmentOutline,
    pub original_payload: String,
    pub beautified_payload: String,
}

impl ParsedDocument {
    pub(crate) fn new(schema: Arc<DocumentPlug>, format: DocumentFormat) -> Self {
        let root = schema.root_node().tag.clone();
        let tree = FragmentTree::new_root(schema.root(), root);
        Self {
            schema,
            format,
            tree,
            original_payload: String::new(),
            beautified_payload: String::new(),
            structural_errors: None,
            diagnostics: InterchangeErrors::new(),
            parsed_at: Utc::now(),
        }
    }

    pub(crate) fn add_structural_error(&mut self, message: impl Into<String>) {
        self.structural_errors
            .get_or_insert_with(Vec::new)
            .push(message.into());
    }

    pub fn root_fragment(&self) -> &Fragment {
        self.tree.root_fragment()
    }

    /// True iff no diagnostic is an error
    pub fn is_valid(&self) -> bool {
        self.diagnostics.is_valid()
    }

    /// Serializable summary with diagnostics, fragment outline and payloads
    pub fn report(&self) -> DocumentReport {
        DocumentReport {
            schema: self.schema.name().to_string(),
            format: self.format,
            parsed_at: self.parsed_at,
            validation: ValidationReporter::new().report(&self.diagnostics),
            structural_errors: self.structural_errors.clone(),
            fragments: self.tree.outline(self.tree.root()),
            original_payload: self.original_payload.clone(),
            beautified_payload: self.beautified_payload.clone(),
        }
    }
}
