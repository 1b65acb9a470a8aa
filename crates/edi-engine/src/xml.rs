//! Event-based XML driver

use crate::document::{DocumentFormat, ParsedDocument};
use crate::matcher::{self, Action, Position};
use crate::{LINE_BREAK, events};
use edi_ir::{Fragment, FragmentId, Span};
use edi_schema::{DocumentPlug, SchemaNodeId};
use edi_validation::{ErrorCode, Severity};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::io::Read;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

const INDENT: &str = "    ";

/// Failures that end the parse early
#[derive(Error, Debug)]
enum ParseFault {
    #[error("malformed XML: {0}")]
    Malformed(String),
    #[error("{0}")]
    Internal(String),
}

/// An open element
#[derive(Debug)]
struct Frame {
    /// Raw element name, prefix included
    name: String,
    /// Fragment built for this element, if any
    fragment: Option<FragmentId>,
    /// Schema node the element matched, if any
    node: Option<SchemaNodeId>,
    start: u64,
    text: String,
    has_children: bool,
}

/// Parses an XML document against a document plug
pub struct XmlParser<R> {
    reader: R,
    plug: Arc<DocumentPlug>,
}

impl<R: Read> XmlParser<R> {
    pub fn new(reader: R, plug: Arc<DocumentPlug>) -> Self {
        Self { reader, plug }
    }

    /// Consume the stream. Malformed input and internal faults end up as
    /// diagnostics; the document is returned either way.
    pub fn parse(mut self) -> ParsedDocument {
        let plug = Arc::clone(&self.plug);
        let mut session = Session::new(&plug);

        info!(
            location = events::XML_PARSE_START.location,
            event_id = events::XML_PARSE_START.id,
            plug = plug.name(),
            "Parsing XML document"
        );

        let mut bytes = Vec::new();
        match self.reader.read_to_end(&mut bytes) {
            Ok(_) => {
                session.doc.original_payload = String::from_utf8_lossy(&bytes).into_owned();
                session.run(&bytes);
            }
            Err(e) => session.fault(&ParseFault::Internal(e.to_string()), 0),
        }

        let doc = session.doc;
        info!(
            location = events::XML_PARSE_END.location,
            event_id = events::XML_PARSE_END.id,
            fragments = doc.tree.len(),
            errors = doc.diagnostics.error_count(),
            warnings = doc.diagnostics.warning_count(),
            "Parsed XML document"
        );
        doc
    }
}

struct Session<'p> {
    plug: &'p DocumentPlug,
    doc: ParsedDocument,
    frames: Vec<Frame>,
    /// Depth of the element that stopped matching; cleared when it closes
    stopped_at: Option<usize>,
    root_seen: bool,
    sequence: u32,
}

impl<'p> Session<'p> {
    fn new(shared: &'p Arc<DocumentPlug>) -> Self {
        let plug: &'p DocumentPlug = shared;
        let mut doc = ParsedDocument::new(Arc::clone(shared), DocumentFormat::Xml);
        doc.diagnostics
            .add_transaction_set(1, plug.root_node().tag.clone(), "", true);

        Self {
            plug,
            doc,
            frames: Vec::new(),
            stopped_at: None,
            root_seen: false,
            sequence: 0,
        }
    }

    fn run(&mut self, bytes: &[u8]) {
        let mut reader = Reader::from_reader(bytes);
        reader.config_mut().trim_text(true);

        loop {
            let event = reader.read_event();
            let after = offset(&reader);

            let result = match event {
                // `<` + content + `>`
                Ok(Event::Start(e)) => {
                    let start = after.saturating_sub(e.len() as u64 + 2);
                    self.start_element(&e, start, after)
                }
                // `<` + content + `/>`
                Ok(Event::Empty(e)) => {
                    let start = after.saturating_sub(e.len() as u64 + 3);
                    self.start_element(&e, start, after)
                        .and_then(|()| self.end_element(after))
                }
                Ok(Event::End(_)) => self.end_element(after),
                Ok(Event::Text(t)) => match t.unescape() {
                    Ok(text) => self.text(&text),
                    Err(e) => Err(ParseFault::Malformed(e.to_string())),
                },
                Ok(Event::CData(c)) => self.text(&String::from_utf8_lossy(&c)),
                Ok(Event::Eof) => {
                    self.end_of_input(after);
                    break;
                }
                Ok(_) => Ok(()),
                Err(e) => Err(ParseFault::Malformed(e.to_string())),
            };

            if let Err(fault) = result {
                self.fault(&fault, offset(&reader));
                break;
            }
        }
    }

    fn start_element(&mut self, e: &BytesStart<'_>, start: u64, after: u64) -> Result<(), ParseFault> {
        self.sequence += 1;
        let depth = self.frames.len();
        let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
        let local = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
        let position = Position::new(self.sequence, Span::new(start, after.saturating_sub(1)));

        if depth > 0 || !self.doc.beautified_payload.is_empty() {
            self.doc.beautified_payload.push_str(LINE_BREAK);
        }
        self.doc.beautified_payload.push_str(&INDENT.repeat(depth));
        self.doc.beautified_payload.push('<');
        self.doc.beautified_payload.push_str(&String::from_utf8_lossy(e));
        self.doc.beautified_payload.push('>');

        if let Some(parent) = self.frames.last_mut() {
            parent.has_children = true;
        }

        let mut frame = Frame {
            name,
            fragment: None,
            node: None,
            start,
            text: String::new(),
            has_children: false,
        };

        debug!(
            location = events::XML_ELEMENT.location,
            event_id = events::XML_ELEMENT.id,
            element = %local,
            depth,
            sequence = self.sequence,
            stopped = self.stopped_at.is_some(),
            "Start element"
        );

        if depth == 0 {
            self.root_element(&mut frame, &local, position);
        } else if self.stopped_at.is_none() {
            self.child_element(&mut frame, &local, depth, position)?;
        }

        self.frames.push(frame);
        Ok(())
    }

    fn root_element(&mut self, frame: &mut Frame, local: &str, position: Position) {
        let plug = self.plug;
        let expected = &plug.root_node().tag;

        if self.root_seen {
            self.add(
                local,
                ErrorCode::UnexpectedSegment,
                Some(format!("'{local}' follows the root element")),
                position,
            );
            self.stopped_at = Some(0);
            return;
        }
        self.root_seen = true;

        if local.eq_ignore_ascii_case(expected) {
            frame.fragment = Some(self.doc.tree.root());
            frame.node = Some(plug.root());
        } else {
            warn!(
                location = events::XML_ELEMENT.location,
                event_id = events::XML_ELEMENT.id,
                expected = %expected,
                found = %local,
                "Invalid root element"
            );
            self.add(
                local,
                ErrorCode::InvalidRootNode,
                Some(format!("expected '{expected}', found '{local}'")),
                position,
            );
            self.stopped_at = Some(0);
        }
    }

    fn child_element(
        &mut self,
        frame: &mut Frame,
        local: &str,
        depth: usize,
        position: Position,
    ) -> Result<(), ParseFault> {
        let (Some(parent_fragment), Some(parent_node)) = self
            .frames
            .last()
            .map_or((None, None), |parent| (parent.fragment, parent.node))
        else {
            return Err(ParseFault::Internal(format!(
                "open element above '{local}' has no schema binding"
            )));
        };

        let verdict = matcher::resolve_element(
            self.plug,
            &self.doc.tree,
            parent_fragment,
            parent_node,
            local,
            position,
        );
        for diagnostic in verdict.diagnostics {
            self.doc.diagnostics.add_diagnostic(diagnostic);
        }

        match verdict.action {
            Action::Append { node, .. } => {
                let fragment = Fragment::known(node, self.plug.node(node).tag.clone())
                    .with_span(position.span);
                match self.doc.tree.append_child(parent_fragment, fragment) {
                    Ok(id) => {
                        frame.fragment = Some(id);
                        frame.node = Some(node);
                    }
                    Err(e) => {
                        self.fragment_fault(local, position, &e);
                        self.stopped_at = Some(depth);
                    }
                }
            }
            Action::Unrecognized => {
                match matcher::append_unrecognized(
                    &mut self.doc.tree,
                    parent_fragment,
                    local,
                    None,
                    position.span,
                ) {
                    Ok(id) => frame.fragment = Some(id),
                    Err(e) => self.fragment_fault(local, position, &e),
                }
                self.stopped_at = Some(depth);
            }
            Action::Reject => self.stopped_at = Some(depth),
        }

        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<(), ParseFault> {
        let Some(frame) = self.frames.last_mut() else {
            // Text outside the root element carries nothing to bind
            return Ok(());
        };
        frame.text.push_str(text);
        self.doc.beautified_payload.push_str(text);
        Ok(())
    }

    fn end_element(&mut self, after: u64) -> Result<(), ParseFault> {
        let frame = self
            .frames
            .pop()
            .ok_or_else(|| ParseFault::Internal("end element without an open element".into()))?;
        let depth = self.frames.len();
        let span = Span::new(frame.start, after.saturating_sub(1));
        let position = Position::new(self.sequence, span);

        if frame.has_children {
            self.doc.beautified_payload.push_str(LINE_BREAK);
            self.doc.beautified_payload.push_str(&INDENT.repeat(depth));
        }
        self.doc.beautified_payload.push_str("</");
        self.doc.beautified_payload.push_str(&frame.name);
        self.doc.beautified_payload.push('>');

        if let Some(id) = frame.fragment {
            if !frame.text.is_empty() {
                if let Err(e) = self.doc.tree.set_value(id, frame.text.as_str()) {
                    self.fragment_fault(&frame.name, position, &e);
                }
            }
            if let Err(e) = self.doc.tree.set_span(id, span) {
                self.fragment_fault(&frame.name, position, &e);
            }
        }

        if let (None, Some(id), Some(node)) = (self.stopped_at, frame.fragment, frame.node) {
            let missing = matcher::missing_children(self.plug, &self.doc.tree, id, node, position);
            for diagnostic in missing {
                self.doc.diagnostics.add_diagnostic(diagnostic);
            }
        }

        if self.stopped_at == Some(depth) {
            self.stopped_at = None;
        }
        Ok(())
    }

    fn end_of_input(&mut self, at: u64) {
        let end = at.saturating_sub(1);
        let position = Position::new(self.sequence, Span::new(end, end));

        if let Some(open) = self.frames.last() {
            let detail = format!("end of input inside '{}'", open.name);
            self.malformed(&detail, position);
        } else if !self.root_seen {
            let expected = self.plug.root_node().tag.clone();
            self.add(
                &expected,
                ErrorCode::InvalidRootNode,
                Some(format!("expected '{expected}', found no element")),
                position,
            );
        }
    }

    fn add(&mut self, tag: &str, code: ErrorCode, detail: Option<String>, position: Position) {
        self.doc.diagnostics.add_diagnostic(matcher::diagnostic(
            tag,
            code,
            detail,
            position,
            Severity::Error,
        ));
    }

    fn malformed(&mut self, detail: &str, position: Position) {
        error!(
            location = events::XML_MALFORMED.location,
            event_id = events::XML_MALFORMED.id,
            offset = position.span.start,
            detail,
            "Malformed XML"
        );
        let tag = self
            .frames
            .last()
            .map(|f| f.name.clone())
            .unwrap_or_default();
        self.add(&tag, ErrorCode::UnexpectedSegment, Some(detail.to_string()), position);
        self.doc.add_structural_error(detail);
    }

    fn fault(&mut self, fault: &ParseFault, at: u64) {
        let position = Position::new(self.sequence, Span::new(at, at));
        match fault {
            ParseFault::Malformed(_) => self.malformed(&fault.to_string(), position),
            ParseFault::Internal(message) => {
                error!(
                    location = events::XML_INTERNAL_FAULT.location,
                    event_id = events::XML_INTERNAL_FAULT.id,
                    offset = at,
                    error = %message,
                    "Internal parser fault"
                );
                self.doc.diagnostics.add_generic_error(
                    "",
                    ErrorCode::InternalError,
                    format!("{}: {message}", ErrorCode::InternalError.description()),
                    self.sequence,
                    at,
                    at,
                );
                self.doc.add_structural_error(message.as_str());
            }
        }
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
}

fn offset(reader: &Reader<&[u8]>) -> u64 {
    u64::try_from(reader.buffer_position()).unwrap_or(u64::MAX)
}
