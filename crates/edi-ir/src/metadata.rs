//! Source positions attached to fragments
#![allow(clippy::must_use_candidate)]

use serde::{Deserialize, Serialize};

/// Byte range of the input a fragment or diagnostic refers to.
///
/// `end` is inclusive: a three-byte segment starting at 10 spans `10..=12`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    /// Offset of the first byte
    pub start: u64,
    /// Offset of the last byte
    pub end: u64,
}

impl Span {
    /// Create a new span
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Span covering `len` bytes from `start`; an empty range collapses to `start`
    pub fn from_len(start: u64, len: u64) -> Self {
        Self {
            start,
            end: start + len.saturating_sub(1),
        }
    }

    /// Number of bytes covered
    pub fn byte_len(&self) -> u64 {
        self.end.saturating_sub(self.start) + 1
    }

    /// Whether `offset` falls inside the span
    pub fn contains(&self, offset: u64) -> bool {
        (self.start..=self.end).contains(&offset)
    }
}
