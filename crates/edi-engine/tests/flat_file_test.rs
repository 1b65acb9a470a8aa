//! Integration tests for the flat-file driver
//!
//! These tests parse complete documents and check the fragment tree, the
//! diagnostics and the reconstructed payloads together.

use edi_engine::{LINE_BREAK, ParsedDocument, parse_flat_file};
use edi_ir::{Binding, Span};
use edi_schema::{Delimiters, DocumentPlug, NodeDef, SchemaLoader};
use edi_validation::{ErrorCode, Severity};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

fn abc_plug() -> Arc<DocumentPlug> {
    Arc::new(
        DocumentPlug::new(
            "ABC",
            NodeDef::container("ROOT").children([
                NodeDef::segment("A1").mandatory(),
                NodeDef::segment("A2").mandatory(),
                NodeDef::segment("A3"),
                NodeDef::segment("A4").max_occurs(0),
            ]),
        )
        .unwrap()
        .with_delimiters(Delimiters::default()),
    )
}

fn loop_plug() -> Arc<DocumentPlug> {
    Arc::new(
        DocumentPlug::new(
            "PO",
            NodeDef::container("850").children([
                NodeDef::segment("BEG")
                    .mandatory()
                    .children([NodeDef::leaf("BEG01"), NodeDef::leaf("BEG02")]),
                NodeDef::container("N1Loop").max_occurs(2).children([
                    NodeDef::segment("N1").mandatory(),
                    NodeDef::segment("N3").mandatory(),
                    NodeDef::segment("N4"),
                ]),
                NodeDef::segment("CTT").mandatory(),
            ]),
        )
        .unwrap()
        .with_delimiters(Delimiters::default()),
    )
}

fn ignorable_plug(first: NodeDef, second: NodeDef) -> Arc<DocumentPlug> {
    Arc::new(
        DocumentPlug::new("IGN", NodeDef::container("ROOT").children([first, second]))
            .unwrap()
            .with_delimiters(Delimiters::default()),
    )
}

fn parse(input: &str, plug: Arc<DocumentPlug>) -> ParsedDocument {
    parse_flat_file(Some(input.as_bytes()), Some(plug)).unwrap()
}

fn root_tags(doc: &ParsedDocument) -> Vec<String> {
    doc.tree
        .children(doc.tree.root())
        .iter()
        .map(|id| doc.tree.fragment(*id).tag.clone())
        .collect()
}

fn testdata(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("testdata")
        .join(path)
}

#[test]
fn test_exact_match_is_valid() {
    let doc = parse("A1*x*y~A2*z~", abc_plug());

    assert!(doc.is_valid());
    assert!(doc.diagnostics.is_empty());
    assert_eq!(root_tags(&doc), vec!["A1", "A2"]);

    let a1 = doc.tree.children(doc.tree.root())[0];
    let values: Vec<_> = doc
        .tree
        .children(a1)
        .iter()
        .map(|id| doc.tree.fragment(*id).value.clone().unwrap_or_default())
        .collect();
    assert_eq!(values, vec!["x", "y"]);
}

#[test]
fn test_skipped_mandatory_segment() {
    let doc = parse("A2*z~", abc_plug());

    assert!(!doc.is_valid());
    assert_eq!(root_tags(&doc), vec!["A2"]);

    let diagnostics: Vec<_> = doc.diagnostics.iter().collect();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].tag, "A1");
    assert_eq!(diagnostics[0].code, ErrorCode::MandatorySegmentMissing);
    assert_eq!(diagnostics[0].severity, Severity::Error);
    assert_eq!(diagnostics[0].sequence_number, 1);
    assert_eq!(
        (diagnostics[0].start_offset, diagnostics[0].end_offset),
        (0, 4)
    );
}

#[test]
fn test_unrecognized_segment_does_not_move_cursor() {
    let doc = parse("A1*x~ZZ*1~A2~", abc_plug());

    let codes: Vec<_> = doc.diagnostics.iter().map(|d| d.code).collect();
    assert_eq!(codes, vec![ErrorCode::UnrecognizedSegment]);
    assert_eq!(root_tags(&doc), vec!["A1", "ZZ", "A2"]);

    let noise = doc.tree.children(doc.tree.root())[1];
    assert_eq!(doc.tree.fragment(noise).binding, Binding::Unrecognized);
    let raw = doc.tree.children(noise)[0];
    assert_eq!(doc.tree.fragment(raw).value.as_deref(), Some("ZZ*1"));

    let diagnostic = doc.diagnostics.iter().next().unwrap();
    assert_eq!(diagnostic.sequence_number, 2);
    assert_eq!((diagnostic.start_offset, diagnostic.end_offset), (5, 9));
}

#[test]
fn test_disabled_segment_is_rejected() {
    let doc = parse("A1~A2~A4*q~", abc_plug());

    let codes: Vec<_> = doc.diagnostics.iter().map(|d| d.code).collect();
    assert_eq!(codes, vec![ErrorCode::UnexpectedSegment]);
    assert_eq!(root_tags(&doc), vec!["A1", "A2"]);
}

#[test]
fn test_missing_before_ignorable_segment_is_warning() {
    let plug = ignorable_plug(
        NodeDef::segment("A1").mandatory(),
        NodeDef::segment("A2").mandatory().ignorable(),
    );

    let doc = parse("A2*z~", plug);

    assert!(doc.is_valid());
    assert_eq!(doc.diagnostics.warning_count(), 1);
    assert_eq!(doc.diagnostics.iter().next().unwrap().tag, "A1");
}

#[test]
fn test_skipped_ignorable_segment_before_strict_segment_is_error() {
    let plug = ignorable_plug(
        NodeDef::segment("A1").mandatory().ignorable(),
        NodeDef::segment("A2").mandatory(),
    );

    let doc = parse("A2*z~", plug);

    let diagnostics: Vec<_> = doc.diagnostics.iter().collect();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].tag, "A1");
    assert_eq!(diagnostics[0].severity, Severity::Error);
    assert!(!doc.is_valid());
}

#[test]
fn test_missing_mandatory_at_end_of_input() {
    let doc = parse("A1~", abc_plug());

    let diagnostics: Vec<_> = doc.diagnostics.iter().collect();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].tag, "A2");
    assert_eq!(diagnostics[0].code, ErrorCode::MandatorySegmentMissing);
    assert_eq!(diagnostics[0].start_offset, 2);
}

#[test]
fn test_repeated_segment_over_maximum() {
    let doc = parse("A1~A1~A2~", abc_plug());

    let codes: Vec<_> = doc.diagnostics.iter().map(|d| d.code).collect();
    assert_eq!(codes, vec![ErrorCode::SegmentExceedsMaximumUse]);
    assert_eq!(root_tags(&doc), vec!["A1", "A2"]);
}

#[test]
fn test_loops_nest_fragments() {
    let doc = parse(
        "BEG*00*SA~N1*BY~N3*street~N1*ST~N3*road~N4*city~CTT*2~",
        loop_plug(),
    );

    assert!(doc.is_valid(), "{:?}", doc.diagnostics);
    assert_eq!(root_tags(&doc), vec!["BEG", "N1Loop", "N1Loop", "CTT"]);

    let loops: Vec<_> = doc.tree.children(doc.tree.root())[1..3].to_vec();
    assert_eq!(doc.tree.children(loops[0]).len(), 2);
    assert_eq!(doc.tree.children(loops[1]).len(), 3);

    // "BEG*00*SA~" is 10 bytes, the first loop covers "N1*BY~N3*street~"
    assert_eq!(doc.tree.fragment(loops[0]).span, Some(Span::new(10, 25)));
}

#[test]
fn test_loop_over_maximum() {
    let doc = parse(
        "BEG~N1*A~N3~N1*B~N3~N1*C~CTT~",
        loop_plug(),
    );

    let codes: Vec<_> = doc.diagnostics.iter().map(|d| d.code).collect();
    assert_eq!(codes, vec![ErrorCode::LoopOccursOverMaximumTimes]);
    assert_eq!(root_tags(&doc), vec!["BEG", "N1Loop", "N1Loop", "CTT"]);
}

#[test]
fn test_missing_segment_inside_closed_loop() {
    let doc = parse("BEG~N1*BY~N1*ST~N3~CTT~", loop_plug());

    let diagnostics: Vec<_> = doc.diagnostics.iter().collect();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].tag, "N3");
    assert_eq!(diagnostics[0].sequence_number, 3);
}

#[test]
fn test_too_many_elements_is_fragment_creation_error() {
    let doc = parse("BEG*00*SA*EXTRA~CTT~", loop_plug());

    let codes: Vec<_> = doc.diagnostics.iter().map(|d| d.code).collect();
    assert_eq!(codes, vec![ErrorCode::DocumentFragmentCreation]);
    assert_eq!(root_tags(&doc), vec!["CTT"]);
    assert_eq!(doc.structural_errors.as_ref().map(Vec::len), Some(1));
}

#[test]
fn test_payload_round_trip() {
    let input = "A1*x*y~\nA2*z~\n";
    let doc = parse(input, abc_plug());

    assert!(doc.is_valid());
    assert_eq!(doc.original_payload, input);
    assert_eq!(
        doc.beautified_payload,
        format!("A1*x*y~{LINE_BREAK}A2*z~{LINE_BREAK}")
    );

    // The leading line break belongs to the second segment's span
    let a2 = doc.tree.children(doc.tree.root())[1];
    assert_eq!(doc.tree.fragment(a2).span, Some(Span::new(7, 12)));
}

#[test]
fn test_two_byte_terminator() {
    let plug = Arc::new(
        DocumentPlug::new(
            "ABC",
            NodeDef::container("ROOT").children([
                NodeDef::segment("A1").mandatory(),
                NodeDef::segment("A2").mandatory(),
            ]),
        )
        .unwrap()
        .with_separators(vec![b'*'], vec![b'~', b'\r', b'\n']),
    );

    let doc = parse("A1*x~\r\nA2~\r\n", plug);

    assert!(doc.is_valid());
    assert_eq!(doc.beautified_payload, "A1*x~\r\nA2~\r\n");
    let a2 = doc.tree.children(doc.tree.root())[1];
    assert_eq!(doc.tree.fragment(a2).span, Some(Span::new(7, 11)));
}

#[test]
fn test_sequential_parses_are_identical() {
    let plug = loop_plug();
    let input = "N1*BY~ZZ~BEG~N1*A~N1*B~N1*C~";

    let first = parse(input, Arc::clone(&plug));
    let second = parse(input, Arc::clone(&plug));

    assert!(!first.is_valid());
    assert_eq!(first.diagnostics, second.diagnostics);
    assert_eq!(first.tree, second.tree);
}

#[test]
fn test_concurrent_parses_share_one_plug() {
    let plug = loop_plug();
    let input = "BEG*00*SA~N1*BY~N3*x~CTT~";

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let plug = Arc::clone(&plug);
            thread::spawn(move || parse(input, plug))
        })
        .collect();

    let docs: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for doc in &docs {
        assert!(doc.is_valid());
        assert_eq!(doc.tree, docs[0].tree);
    }
}

#[test]
fn test_purchase_order_from_schema_file() {
    let loader = SchemaLoader::default();
    let plug = loader
        .load_path(&testdata("schemas/x12_850.yaml"))
        .unwrap();
    let input = std::fs::read(testdata("x12/po_valid.edi")).unwrap();

    let doc = parse_flat_file(Some(input.as_slice()), Some(plug)).unwrap();

    assert!(doc.is_valid(), "{:?}", doc.diagnostics);
    assert_eq!(
        root_tags(&doc),
        vec!["BEG", "REF", "N1Loop", "N1Loop", "PO1Loop", "PO1Loop", "CTT"]
    );
}

#[test]
fn test_invalid_purchase_order_from_schema_file() {
    let loader = SchemaLoader::default();
    let plug = loader
        .load_path(&testdata("schemas/x12_850.yaml"))
        .unwrap();
    let input = std::fs::read(testdata("x12/po_invalid.edi")).unwrap();

    let doc = parse_flat_file(Some(input.as_slice()), Some(plug)).unwrap();

    let summary: Vec<_> = doc
        .diagnostics
        .iter()
        .map(|d| (d.tag.as_str(), d.code, d.severity))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("ZZZ", ErrorCode::UnrecognizedSegment, Severity::Error),
            ("N3", ErrorCode::MandatorySegmentMissing, Severity::Error),
            ("MSG", ErrorCode::UnexpectedSegment, Severity::Error),
            ("CTT", ErrorCode::MandatorySegmentMissing, Severity::Warning),
        ]
    );
    assert_eq!(doc.diagnostics.error_count(), 3);
}

#[test]
fn test_report_serializes() {
    let doc = parse("A2*z~", abc_plug());
    let json = serde_json::to_value(doc.report()).unwrap();

    assert_eq!(json["format"], "flat_file");
    assert_eq!(json["validation"]["error_count"], 1);
    assert_eq!(json["fragments"]["children"][0]["tag"], "A2");
}
