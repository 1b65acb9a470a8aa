//! Validation reporter

use crate::errors::{Diagnostic, InterchangeErrors, Severity, TransactionSetErrors};
use serde::Serialize;
use std::fmt::Write as _;

/// Serializable summary of an interchange's diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub error_count: usize,
    pub warning_count: usize,
    pub transaction_sets: Vec<TransactionSetReport>,
}

/// Diagnostics of one transaction set as they appear in a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionSetReport {
    pub sequence: u32,
    pub type_tag: String,
    pub control_number: String,
    pub is_valid: bool,
    pub issues: Vec<ValidationIssue>,
}

/// One diagnostic, flattened for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub tag: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x12_code: Option<u8>,
    pub description: String,
    pub sequence_number: u32,
    pub start_offset: u64,
    pub end_offset: u64,
    pub severity: Severity,
}

impl From<&Diagnostic> for ValidationIssue {
    fn from(diagnostic: &Diagnostic) -> Self {
        Self {
            tag: diagnostic.tag.clone(),
            code: diagnostic.code.name().to_string(),
            x12_code: diagnostic.code.code(),
            description: diagnostic.description.clone(),
            sequence_number: diagnostic.sequence_number,
            start_offset: diagnostic.start_offset,
            end_offset: diagnostic.end_offset,
            severity: diagnostic.severity,
        }
    }
}

/// Reports validation results
#[derive(Debug, Clone)]
pub struct ValidationReporter {
    include_warnings: bool,
}

impl ValidationReporter {
    /// Create a new validation reporter
    pub fn new() -> Self {
        Self {
            include_warnings: true,
        }
    }

    /// Whether warnings are listed; counts always include them
    pub fn with_warnings(mut self, include_warnings: bool) -> Self {
        self.include_warnings = include_warnings;
        self
    }

    /// Summarize the diagnostics of an interchange
    pub fn report(&self, errors: &InterchangeErrors) -> ValidationReport {
        ValidationReport {
            is_valid: errors.is_valid(),
            error_count: errors.error_count(),
            warning_count: errors.warning_count(),
            transaction_sets: errors
                .transaction_sets()
                .iter()
                .map(|ts| self.transaction_set(ts))
                .collect(),
        }
    }

    fn transaction_set(&self, ts: &TransactionSetErrors) -> TransactionSetReport {
        TransactionSetReport {
            sequence: ts.sequence,
            type_tag: ts.type_tag.clone(),
            control_number: ts.control_number.clone(),
            is_valid: ts.is_valid,
            issues: ts
                .diagnostics
                .iter()
                .filter(|d| self.include_warnings || d.severity == Severity::Error)
                .map(ValidationIssue::from)
                .collect(),
        }
    }

    /// Human-readable listing, one line per issue
    pub fn render_text(&self, errors: &InterchangeErrors) -> String {
        let report = self.report(errors);
        let mut out = String::new();

        let status = if report.is_valid { "VALID" } else { "INVALID" };
        let _ = writeln!(
            out,
            "{status}: {} error(s), {} warning(s)",
            report.error_count, report.warning_count
        );

        for ts in &report.transaction_sets {
            if ts.issues.is_empty() {
                continue;
            }
            let _ = writeln!(
                out,
                "Transaction set {} {} {}",
                ts.sequence, ts.type_tag, ts.control_number
            );
            for issue in &ts.issues {
                let code = issue
                    .x12_code
                    .map_or_else(|| issue.code.clone(), |n| format!("{n} {}", issue.code));
                let _ = writeln!(
                    out,
                    "  [{}] #{} {} ({}) {} at {}..{}",
                    issue.severity,
                    issue.sequence_number,
                    issue.tag,
                    code,
                    issue.description,
                    issue.start_offset,
                    issue.end_offset
                );
            }
        }

        out
    }
}

impl Default for ValidationReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;

    fn sample() -> InterchangeErrors {
        let mut errors = InterchangeErrors::new();
        errors.add_transaction_set(1, "850", "0001", true);
        errors.add_segment_error(
            "A1",
            ErrorCode::MandatorySegmentMissing,
            "Mandatory segment missing",
            1,
            0,
            4,
            Severity::Error,
        );
        errors.add_segment_error(
            "CTT",
            ErrorCode::MandatorySegmentMissing,
            "Mandatory segment missing",
            2,
            5,
            9,
            Severity::Warning,
        );
        errors
    }

    #[test]
    fn test_report_counts() {
        let report = ValidationReporter::new().report(&sample());

        assert!(!report.is_valid);
        assert_eq!(report.error_count, 1);
        assert_eq!(report.warning_count, 1);
        assert_eq!(report.transaction_sets[0].issues.len(), 2);
        assert_eq!(report.transaction_sets[0].issues[0].x12_code, Some(3));
    }

    #[test]
    fn test_report_without_warnings() {
        let report = ValidationReporter::new()
            .with_warnings(false)
            .report(&sample());

        assert_eq!(report.warning_count, 1);
        assert_eq!(report.transaction_sets[0].issues.len(), 1);
        assert_eq!(report.transaction_sets[0].issues[0].tag, "A1");
    }

    #[test]
    fn test_report_serializes() {
        let report = ValidationReporter::new().report(&sample());
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["is_valid"], false);
        assert_eq!(
            json["transaction_sets"][0]["issues"][1]["severity"],
            "Warning"
        );
        assert_eq!(
            json["transaction_sets"][0]["issues"][0]["code"],
            "MandatorySegmentMissing"
        );
    }

    #[test]
    fn test_render_text() {
        let text = ValidationReporter::new().render_text(&sample());

        assert!(text.starts_with("INVALID: 1 error(s), 1 warning(s)"));
        assert!(text.contains("[Error] #1 A1 (3 MandatorySegmentMissing)"));
        assert!(text.contains("at 5..9"));
    }

    #[test]
    fn test_render_text_valid() {
        let text = ValidationReporter::new().render_text(&InterchangeErrors::new());
        assert_eq!(text, "VALID: 0 error(s), 0 warning(s)\n");
    }
}
