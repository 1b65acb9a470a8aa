//! Matching shared by the flat-file and XML drivers.
//!
//! The resolve functions are pure over the schema state they are handed:
//! they decide what the driver should do with one incoming tag and which
//! diagnostics that decision produces. Drivers only differ in how they
//! tokenize input and keep their nesting stacks.

use crate::events;
use edi_ir::{Binding, Fragment, FragmentId, FragmentTree, Span};
use edi_schema::{DocumentPlug, Outcome, SchemaCursor, SchemaNodeId};
use edi_validation::{Diagnostic, ErrorCode, Severity};
use tracing::{debug, warn};

/// Where a token sits in the input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    /// 1-based count of segments/elements from the document start
    pub sequence: u32,
    pub span: Span,
}

impl Position {
    pub fn new(sequence: u32, span: Span) -> Self {
        Self { sequence, span }
    }
}

/// What the driver does with the token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Close `exited` open loops, open `entered` loops (outermost first), then
    /// append a fragment bound to `node` under the innermost open fragment.
    Append {
        node: SchemaNodeId,
        exited: usize,
        entered: Vec<SchemaNodeId>,
    },
    /// Append an unrecognized placeholder; the schema position is unchanged
    Unrecognized,
    /// Known to the schema but not allowed here; nothing is appended
    Reject,
}

/// Outcome of matching one token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub action: Action,
    pub diagnostics: Vec<Diagnostic>,
}

/// One element token of a flat-file segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Element<'a> {
    pub value: &'a str,
    /// `None` for an empty token
    pub span: Option<Span>,
}

/// Build a diagnostic at `position`.
///
/// The description is the code's standard text, followed by `detail` when
/// one is given.
pub fn diagnostic(
    tag: &str,
    code: ErrorCode,
    detail: Option<String>,
    position: Position,
    severity: Severity,
) -> Diagnostic {
    let description = match detail {
        Some(detail) => format!("{}: {detail}", code.description()),
        None => code.description().to_string(),
    };

    Diagnostic {
        tag: tag.to_string(),
        code,
        description,
        sequence_number: position.sequence,
        start_offset: position.span.start,
        end_offset: position.span.end,
        severity,
    }
}

/// Resolve a flat-file segment tag against the cursor.
///
/// Skipped mandatory nodes are reported at the incoming segment's position.
/// Their severity follows the matched node: `Warning` only when the segment
/// that was accepted is ignorable.
pub fn resolve_segment(cursor: &mut SchemaCursor<'_>, tag: &str, position: Position) -> Verdict {
    let resolution = cursor.resolve_next(tag);
    let plug = cursor.plug();

    let matched_ignorable = resolution
        .matched_node()
        .is_some_and(|node| plug.node(node).is_ignorable);

    let mut diagnostics: Vec<Diagnostic> = resolution
        .missing
        .iter()
        .map(|missing| {
            let severity = Severity::for_ignorable(matched_ignorable);
            debug!(
                location = events::MATCH_MISSING.location,
                event_id = events::MATCH_MISSING.id,
                missing = %missing.tag,
                before = tag,
                ?severity,
                "Mandatory segment missing"
            );
            diagnostic(
                &missing.tag,
                ErrorCode::MandatorySegmentMissing,
                Some(format!("'{}' expected before '{tag}'", missing.tag)),
                position,
                severity,
            )
        })
        .collect();

    let action = match resolution.outcome {
        Outcome::Matched {
            node,
            exited,
            entered,
        } => Action::Append {
            node,
            exited,
            entered,
        },
        Outcome::Disabled(node) => {
            diagnostics.push(disabled(plug, node, tag, position));
            Action::Reject
        }
        Outcome::OverMaximum(node) => {
            diagnostics.push(over_maximum(plug, node, tag, position));
            Action::Reject
        }
        Outcome::Unrecognized => {
            diagnostics.push(unrecognized(tag, position));
            Action::Unrecognized
        }
    };

    Verdict {
        action,
        diagnostics,
    }
}

/// Resolve an XML element name among the children of `parent_node`.
///
/// Names compare case-insensitively. Occurrences are counted among the
/// children already appended to `parent_fragment`.
pub fn resolve_element(
    plug: &DocumentPlug,
    tree: &FragmentTree,
    parent_fragment: FragmentId,
    parent_node: SchemaNodeId,
    name: &str,
    position: Position,
) -> Verdict {
    let Some(node) = plug.find_child_ignore_case(parent_node, name) else {
        return Verdict {
            action: Action::Unrecognized,
            diagnostics: vec![unrecognized(name, position)],
        };
    };

    let schema_node = plug.node(node);
    if schema_node.is_disabled() {
        return Verdict {
            action: Action::Reject,
            diagnostics: vec![disabled(plug, node, name, position)],
        };
    }

    let count = tree
        .children(parent_fragment)
        .iter()
        .filter(|child| tree.fragment(**child).binding == Binding::Known(node))
        .count();
    if !schema_node.allows_another(u32::try_from(count).unwrap_or(u32::MAX)) {
        return Verdict {
            action: Action::Reject,
            diagnostics: vec![over_maximum(plug, node, name, position)],
        };
    }

    Verdict {
        action: Action::Append {
            node,
            exited: 0,
            entered: Vec::new(),
        },
        diagnostics: Vec::new(),
    }
}

/// Mandatory children of `node` with no fragment bound to them under `fragment`.
///
/// Presence is decided by schema node identity, never by tag text.
pub fn missing_children(
    plug: &DocumentPlug,
    tree: &FragmentTree,
    fragment: FragmentId,
    node: SchemaNodeId,
    position: Position,
) -> Vec<Diagnostic> {
    plug.children(node)
        .iter()
        .copied()
        .filter(|child| {
            let schema_node = plug.node(*child);
            schema_node.is_mandatory
                && !schema_node.is_disabled()
                && !tree.contains_binding(fragment, *child)
        })
        .map(|child| {
            let schema_node = plug.node(child);
            debug!(
                location = events::MATCH_MISSING.location,
                event_id = events::MATCH_MISSING.id,
                missing = %schema_node.tag,
                parent = %plug.node(node).tag,
                "Mandatory element missing"
            );
            diagnostic(
                &schema_node.tag,
                ErrorCode::MandatorySegmentMissing,
                Some(format!(
                    "'{}' expected in '{}'",
                    schema_node.tag,
                    plug.node(node).tag
                )),
                position,
                Severity::for_ignorable(schema_node.is_ignorable),
            )
        })
        .collect()
}

/// Append a segment fragment with one child per element token.
///
/// Tokens map to the segment's leaf children by position. A segment
/// declaring no leaves keeps its tokens as raw data named `<TAG><NN>`.
///
/// # Errors
///
/// Returns [`edi_ir::Error::TooManyElements`] before appending anything when
/// the segment carries more tokens than it declares leaves.
pub fn build_segment(
    plug: &DocumentPlug,
    tree: &mut FragmentTree,
    parent: FragmentId,
    node: SchemaNodeId,
    elements: &[Element<'_>],
    span: Span,
) -> edi_ir::Result<FragmentId> {
    let segment = plug.node(node);
    let leaves = plug.leaf_children(node);
    if !leaves.is_empty() && elements.len() > leaves.len() {
        return Err(edi_ir::Error::TooManyElements {
            segment: segment.tag.clone(),
            expected: leaves.len(),
            found: elements.len(),
        });
    }

    let id = tree.append_child(parent, Fragment::known(node, segment.tag.clone()).with_span(span))?;

    for (index, element) in elements.iter().enumerate() {
        let fragment = match leaves.get(index) {
            Some(leaf) => Fragment::known(*leaf, plug.node(*leaf).tag.clone()),
            None => Fragment::new(Binding::Data, format!("{}{:02}", segment.tag, index + 1)),
        };
        let value = (!element.value.is_empty()).then(|| element.value.to_string());
        let mut fragment = fragment.with_optional_value(value);
        if let Some(span) = element.span {
            fragment = fragment.with_span(span);
        }
        tree.append_child(id, fragment)?;
    }

    Ok(id)
}

/// Append an unrecognized placeholder holding the raw input as one data child.
///
/// # Errors
///
/// Returns [`edi_ir::Error::UnknownFragment`] if `parent` is not in the tree.
pub fn append_unrecognized(
    tree: &mut FragmentTree,
    parent: FragmentId,
    tag: &str,
    raw: Option<&str>,
    span: Span,
) -> edi_ir::Result<FragmentId> {
    let id = tree.append_child(
        parent,
        Fragment::new(Binding::Unrecognized, tag).with_span(span),
    )?;
    if let Some(raw) = raw {
        tree.append_child(
            id,
            Fragment::new(Binding::Data, tag)
                .with_value(raw)
                .with_span(span),
        )?;
    }
    Ok(id)
}

/// Grow a fragment's span so it also covers `span`
pub fn extend_span(tree: &mut FragmentTree, id: FragmentId, span: Span) -> edi_ir::Result<()> {
    let widened = match tree.get(id).and_then(|f| f.span) {
        Some(current) => Span::new(current.start.min(span.start), current.end.max(span.end)),
        None => span,
    };
    tree.set_span(id, widened)
}

fn unrecognized(tag: &str, position: Position) -> Diagnostic {
    debug!(
        location = events::MATCH_UNRECOGNIZED.location,
        event_id = events::MATCH_UNRECOGNIZED.id,
        tag,
        sequence = position.sequence,
        "Unrecognized segment"
    );
    diagnostic(
        tag,
        ErrorCode::UnrecognizedSegment,
        Some(format!("'{tag}'")),
        position,
        Severity::Error,
    )
}

fn disabled(plug: &DocumentPlug, node: SchemaNodeId, tag: &str, position: Position) -> Diagnostic {
    warn!(
        location = events::MATCH_REJECTED.location,
        event_id = events::MATCH_REJECTED.id,
        tag,
        path = %plug.path(node),
        "Matched a disabled node"
    );
    diagnostic(
        tag,
        ErrorCode::UnexpectedSegment,
        Some(format!("'{tag}' is not used in this document")),
        position,
        Severity::Error,
    )
}

fn over_maximum(plug: &DocumentPlug, node: SchemaNodeId, tag: &str, position: Position) -> Diagnostic {
    let schema_node = plug.node(node);
    let code = if plug.is_loop(node) {
        ErrorCode::LoopOccursOverMaximumTimes
    } else {
        ErrorCode::SegmentExceedsMaximumUse
    };
    warn!(
        location = events::MATCH_REJECTED.location,
        event_id = events::MATCH_REJECTED.id,
        tag,
        max_occurs = schema_node.max_occurs,
        "Occurrence limit exceeded"
    );
    diagnostic(
        tag,
        code,
        Some(format!(
            "'{}' allows at most {} occurrence(s)",
            schema_node.tag, schema_node.max_occurs
        )),
        position,
        Severity::for_ignorable(schema_node.is_ignorable),
    )
}
