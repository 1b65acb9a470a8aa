//! Flat-file delimiter definitions
//!
//! Delimiters are declared on a [`DocumentPlug`](crate::DocumentPlug) as
//! ordered lists of separator codes. Index 0 of the segment separators is the
//! primary terminator; indexes 1 and 2 are optional suffix codes (for example
//! a `~` terminator followed by CR and LF).

/// Carriage return code
pub const CR: u8 = b'\r';
/// Line feed code
pub const LF: u8 = b'\n';

/// Separators used for tokenizing a flat-file stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delimiters {
    /// Element separator (e.g. `*`)
    pub element_separator: u8,
    /// Component separator; carried for completeness, flat files ignore it
    pub component_separator: u8,
    /// Primary segment terminator (e.g. `~`)
    pub segment_terminator: u8,
    /// Up to two extra terminator codes, 0 means absent
    pub segment_terminator_suffix: [u8; 2],
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            element_separator: b'*',
            component_separator: b':',
            segment_terminator: b'~',
            segment_terminator_suffix: [0, 0],
        }
    }
}

impl Delimiters {
    /// Create delimiters with a single-character terminator
    #[must_use]
    pub fn new(element_separator: u8, segment_terminator: u8) -> Self {
        Self {
            element_separator,
            component_separator: 0,
            segment_terminator,
            segment_terminator_suffix: [0, 0],
        }
    }

    /// Build delimiters from a plug's declared separator codes.
    ///
    /// Returns `None` when either list has no primary code.
    #[must_use]
    pub fn from_codes(element_separators: &[u8], segment_separators: &[u8]) -> Option<Self> {
        let element_separator = *element_separators.first()?;
        let segment_terminator = *segment_separators.first()?;

        Some(Self {
            element_separator,
            component_separator: element_separators.get(1).copied().unwrap_or(0),
            segment_terminator,
            segment_terminator_suffix: [
                segment_separators.get(1).copied().unwrap_or(0),
                segment_separators.get(2).copied().unwrap_or(0),
            ],
        })
    }

    /// Set the component separator
    #[must_use]
    pub fn with_component_separator(mut self, component: u8) -> Self {
        self.component_separator = component;
        self
    }

    /// Set the terminator suffix codes (0 = absent)
    #[must_use]
    pub fn with_suffix(mut self, first: u8, second: u8) -> Self {
        self.segment_terminator_suffix = [first, second];
        self
    }

    /// Effective terminator length: 1 plus the number of non-zero suffix codes
    #[must_use]
    pub fn terminator_len(&self) -> usize {
        1 + self
            .segment_terminator_suffix
            .iter()
            .filter(|code| **code != 0)
            .count()
    }

    /// Terminator bytes in stream order
    #[must_use]
    pub fn terminator(&self) -> Vec<u8> {
        let mut bytes = vec![self.segment_terminator];
        bytes.extend(
            self.segment_terminator_suffix
                .iter()
                .copied()
                .filter(|code| *code != 0),
        );
        bytes
    }

    /// Whether a CR or LF code is part of the terminator
    #[must_use]
    pub fn has_line_break(&self) -> bool {
        self.terminator().iter().any(|b| *b == CR || *b == LF)
    }

    /// Terminator used for the human-formatted payload.
    ///
    /// When the terminator carries no line break, `line_break` is appended so
    /// every segment lands on its own line.
    #[must_use]
    pub fn display_terminator(&self, line_break: &str) -> String {
        let mut display = String::from_utf8_lossy(&self.terminator()).into_owned();
        if !self.has_line_break() {
            display.push_str(line_break);
        }
        display
    }
}
