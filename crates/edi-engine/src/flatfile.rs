//! Delimiter-based flat-file driver

use crate::document::{DocumentFormat, ParsedDocument};
use crate::matcher::{self, Action, Element, Position};
use crate::{Error, LINE_BREAK, Result, events};
use edi_ir::{Fragment, FragmentId, Span};
use edi_schema::{Delimiters, DocumentPlug, SchemaCursor};
use edi_validation::{Diagnostic, ErrorCode, Severity};
use std::io::{self, BufRead};
use std::sync::Arc;
use tracing::{debug, error, info, trace};

/// One segment as read from the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSegment {
    /// Segment bytes without the terminator
    pub bytes: Vec<u8>,
    /// Terminator bytes actually consumed; empty for a final unterminated segment
    pub terminator: Vec<u8>,
}

impl RawSegment {
    /// Bytes consumed from the stream for this segment
    pub fn consumed(&self) -> u64 {
        (self.bytes.len() + self.terminator.len()) as u64
    }

    /// Segment bytes without surrounding CR/LF
    pub fn trimmed(&self) -> (usize, &[u8]) {
        let is_break = |b: &u8| *b == b'\r' || *b == b'\n';
        let lead = self.bytes.iter().take_while(|b| is_break(*b)).count();
        let trail = self.bytes[lead..]
            .iter()
            .rev()
            .take_while(|b| is_break(*b))
            .count();
        (lead, &self.bytes[lead..self.bytes.len() - trail])
    }

    /// Whether the segment holds nothing but whitespace
    pub fn is_blank(&self) -> bool {
        self.bytes.iter().all(u8::is_ascii_whitespace)
    }
}

/// Splits a byte stream into terminator-delimited segments
pub struct SegmentReader<R> {
    reader: R,
    delimiters: Delimiters,
}

impl<R: BufRead> SegmentReader<R> {
    pub fn new(reader: R, delimiters: Delimiters) -> Self {
        Self { reader, delimiters }
    }

    /// Read the next segment, or `None` once the stream is exhausted.
    ///
    /// Suffix codes of a two- or three-byte terminator are consumed only when
    /// present, so a stream that omits them still splits correctly.
    ///
    /// # Errors
    ///
    /// Propagates read failures of the underlying stream.
    pub fn next_segment(&mut self) -> io::Result<Option<RawSegment>> {
        let mut bytes = Vec::new();
        let read = self
            .reader
            .read_until(self.delimiters.segment_terminator, &mut bytes)?;
        if read == 0 {
            return Ok(None);
        }

        let mut terminator = Vec::new();
        if bytes.last() == Some(&self.delimiters.segment_terminator) {
            bytes.pop();
            terminator.push(self.delimiters.segment_terminator);

            for code in self.delimiters.segment_terminator_suffix {
                if code == 0 {
                    break;
                }
                let available = self.reader.fill_buf()?;
                if available.first() != Some(&code) {
                    break;
                }
                self.reader.consume(1);
                terminator.push(code);
            }
        }

        Ok(Some(RawSegment { bytes, terminator }))
    }
}

/// Parses a flat file against a document plug
pub struct FlatFileParser<R> {
    segments: SegmentReader<R>,
    plug: Arc<DocumentPlug>,
    delimiters: Delimiters,
}

impl<R: BufRead> FlatFileParser<R> {
    /// # Errors
    ///
    /// Returns [`Error::MissingDelimiters`] when the plug declares no
    /// element or segment separators.
    pub fn new(reader: R, plug: Arc<DocumentPlug>) -> Result<Self> {
        let delimiters = plug
            .delimiters()
            .ok_or_else(|| Error::MissingDelimiters(plug.name().to_string()))?;

        Ok(Self {
            segments: SegmentReader::new(reader, delimiters),
            plug,
            delimiters,
        })
    }

    /// Consume the stream. Document-quality issues end up as diagnostics.
    pub fn parse(mut self) -> ParsedDocument {
        let plug = Arc::clone(&self.plug);
        let mut session = Session::new(&plug, self.delimiters);

        info!(
            location = events::FLAT_PARSE_START.location,
            event_id = events::FLAT_PARSE_START.id,
            plug = plug.name(),
            "Parsing flat file"
        );

        loop {
            match self.segments.next_segment() {
                Ok(Some(segment)) => session.segment(&segment),
                Ok(None) => break,
                Err(e) => {
                    session.read_fault(&e);
                    break;
                }
            }
        }

        let doc = session.finish();
        info!(
            location = events::FLAT_PARSE_END.location,
            event_id = events::FLAT_PARSE_END.id,
            fragments = doc.tree.len(),
            errors = doc.diagnostics.error_count(),
            warnings = doc.diagnostics.warning_count(),
            "Parsed flat file"
        );
        doc
    }
}

struct Session<'p> {
    plug: &'p DocumentPlug,
    delimiters: Delimiters,
    display_terminator: String,
    cursor: SchemaCursor<'p>,
    /// Root followed by the open loop fragments
    stack: Vec<FragmentId>,
    doc: ParsedDocument,
    offset: u64,
    sequence: u32,
}

impl<'p> Session<'p> {
    fn new(shared: &'p Arc<DocumentPlug>, delimiters: Delimiters) -> Self {
        let plug: &'p DocumentPlug = shared;
        let mut doc = ParsedDocument::new(Arc::clone(shared), DocumentFormat::FlatFile);
        // Flat files carry no envelope; everything lands in one synthetic context
        doc.diagnostics
            .add_transaction_set(1, plug.root_node().tag.clone(), "", true);

        let mut cursor = SchemaCursor::new(plug);
        cursor.reset_occurrences();
        cursor.initialize_start_candidates();

        let stack = vec![doc.tree.root()];
        Self {
            plug,
            delimiters,
            display_terminator: delimiters.display_terminator(LINE_BREAK),
            cursor,
            stack,
            doc,
            offset: 0,
            sequence: 0,
        }
    }

    fn segment(&mut self, segment: &RawSegment) {
        let start = self.offset;
        self.offset += segment.consumed();

        self.doc
            .original_payload
            .push_str(&String::from_utf8_lossy(&segment.bytes));
        self.doc
            .original_payload
            .push_str(&String::from_utf8_lossy(&segment.terminator));

        if segment.is_blank() {
            trace!(offset = start, "Skipping blank residue");
            return;
        }

        self.sequence += 1;
        let span = Span::from_len(start, segment.consumed());
        let position = Position::new(self.sequence, span);

        let (lead, body) = segment.trimmed();
        let text = String::from_utf8_lossy(body).into_owned();
        self.doc.beautified_payload.push_str(&text);
        self.doc.beautified_payload.push_str(&self.display_terminator);

        let mut tokens = body.split(|b| *b == self.delimiters.element_separator);
        let tag = tokens
            .next()
            .map(|t| String::from_utf8_lossy(t).trim().to_string())
            .unwrap_or_default();

        // Offsets advance by raw byte length; only the values are decoded
        let raw: Vec<&[u8]> = tokens.collect();
        let values: Vec<String> = raw
            .iter()
            .map(|t| String::from_utf8_lossy(t).into_owned())
            .collect();
        let mut elements = Vec::with_capacity(values.len());
        let mut at = start + (lead + tag_len(body, self.delimiters.element_separator)) as u64;
        for (bytes, value) in raw.iter().zip(&values) {
            // Skip the separator in front of the token
            at += 1;
            let len = bytes.len() as u64;
            elements.push(Element {
                value,
                span: (len > 0).then(|| Span::from_len(at, len)),
            });
            at += len;
        }

        debug!(
            location = events::FLAT_SEGMENT.location,
            event_id = events::FLAT_SEGMENT.id,
            tag = %tag,
            sequence = self.sequence,
            start = span.start,
            end = span.end,
            "Segment"
        );

        let verdict = matcher::resolve_segment(&mut self.cursor, &tag, position);
        for diagnostic in verdict.diagnostics {
            self.doc.diagnostics.add_diagnostic(diagnostic);
        }

        match verdict.action {
            Action::Append {
                node,
                exited,
                entered,
            } => {
                for _ in 0..exited {
                    if self.stack.len() > 1 {
                        self.stack.pop();
                    }
                }
                for loop_node in entered {
                    let parent = self.top();
                    let fragment = Fragment::known(loop_node, self.plug.node(loop_node).tag.clone());
                    match self.doc.tree.append_child(parent, fragment) {
                        Ok(id) => self.stack.push(id),
                        Err(e) => self.fragment_fault(&tag, position, &e),
                    }
                }

                let parent = self.top();
                if let Err(e) =
                    matcher::build_segment(self.plug, &mut self.doc.tree, parent, node, &elements, span)
                {
                    self.fragment_fault(&tag, position, &e);
                }
            }
            Action::Unrecognized => {
                let parent = self.top();
                if let Err(e) =
                    matcher::append_unrecognized(&mut self.doc.tree, parent, &tag, Some(&text), span)
                {
                    self.fragment_fault(&tag, position, &e);
                }
            }
            Action::Reject => {}
        }

        for id in self.stack.iter().skip(1).copied().collect::<Vec<_>>() {
            if let Err(e) = matcher::extend_span(&mut self.doc.tree, id, span) {
                self.fragment_fault(&tag, position, &e);
            }
        }
    }

    fn top(&self) -> FragmentId {
        self.stack.last().copied().unwrap_or_else(|| self.doc.tree.root())
    }

    fn fragment_fault(&mut self, tag: &str, position: Position, err: &edi_ir::Error) {
        error!(
            location = events::FRAGMENT_CREATION.location,
            event_id = events::FRAGMENT_CREATION.id,
            tag,
            error = %err,
            "Fragment creation failed"
        );
        self.doc.diagnostics.add_diagnostic(matcher::diagnostic(
            tag,
            ErrorCode::DocumentFragmentCreation,
            Some(err.to_string()),
            position,
            Severity::Error,
        ));
        self.doc.add_structural_error(format!("{tag}: {err}"));
    }

    fn read_fault(&mut self, err: &io::Error) {
        error!(
            location = events::FLAT_READ_FAULT.location,
            event_id = events::FLAT_READ_FAULT.id,
            offset = self.offset,
            error = %err,
            "Failed to read segment"
        );
        self.doc.diagnostics.add_generic_error(
            "",
            ErrorCode::InternalError,
            format!("{}: {err}", ErrorCode::InternalError.description()),
            self.sequence,
            self.offset,
            self.offset,
        );
        self.doc.add_structural_error(err.to_string());
    }

    fn finish(mut self) -> ParsedDocument {
        let end = self.offset.saturating_sub(1);
        let position = Position::new(self.sequence, Span::new(end, end));

        let missing: Vec<Diagnostic> = self
            .cursor
            .finish()
            .into_iter()
            .map(|missing| {
                matcher::diagnostic(
                    &missing.tag,
                    ErrorCode::MandatorySegmentMissing,
                    Some(format!("'{}' expected before end of input", missing.tag)),
                    position,
                    Severity::for_ignorable(self.plug.node(missing.node).is_ignorable),
                )
            })
            .collect();
        for diagnostic in missing {
            self.doc.diagnostics.add_diagnostic(diagnostic);
        }

        if self.offset > 0 {
            let root = self.doc.tree.root();
            if let Err(e) = self.doc.tree.set_span(root, Span::from_len(0, self.offset)) {
                self.fragment_fault("", position, &e);
            }
        }

        self.doc
    }
}

fn tag_len(body: &[u8], separator: u8) -> usize {
    body.iter().position(|b| *b == separator).unwrap_or(body.len())
}
