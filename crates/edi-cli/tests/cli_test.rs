use std::env;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::NamedTempFile;

fn cargo_bin() -> PathBuf {
    if let Ok(path) = env::var("CARGO_BIN_EXE_edi") {
        return PathBuf::from(path);
    }

    let target_dir = env::var("CARGO_TARGET_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| repo_root().join("target"));
    let executable_name = format!("edi{}", std::env::consts::EXE_SUFFIX);
    let fallback = target_dir.join("debug").join(executable_name);

    if fallback.exists() {
        return fallback;
    }

    panic!(
        "CARGO_BIN_EXE_edi is not set and fallback binary was not found at {}",
        fallback.display()
    );
}

fn repo_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
}

fn testdata_path(path: &str) -> PathBuf {
    repo_root().join("testdata").join(path)
}

fn temp_file(content: &str) -> NamedTempFile {
    let file = NamedTempFile::new().expect("temporary file should be created");
    std::fs::write(file.path(), content).expect("temporary file should be written");
    file
}

fn run(args: &[&str]) -> Output {
    Command::new(cargo_bin())
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("edi should execute")
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn assert_exit_code(output: &Output, expected: i32) {
    let actual = output.status.code().unwrap_or(-1);
    assert_eq!(
        actual,
        expected,
        "unexpected exit code; stdout: {}; stderr: {}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn parse_prints_json_report_for_flat_file() {
    let input = path_arg(&testdata_path("x12/po_valid.edi"));
    let schema = path_arg(&testdata_path("schemas/x12_850.yaml"));
    let output = run(&["parse", &input, "-s", &schema]);

    assert_exit_code(&output, 0);

    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(report["format"], "flat_file");
    assert_eq!(report["validation"]["is_valid"], true);
    assert_eq!(report["fragments"]["tag"], "850");
}

#[test]
fn parse_detects_xml_input() {
    let input = path_arg(&testdata_path("xml/order_invalid.xml"));
    let schema = path_arg(&testdata_path("schemas/order.json"));
    let output = run(&["parse", &input, "--schema", &schema, "--pretty"]);

    assert_exit_code(&output, 0);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.lines().count() > 1, "pretty output spans lines");

    let report: serde_json::Value = serde_json::from_str(&stdout).expect("stdout should be JSON");
    assert_eq!(report["format"], "xml");
    assert_eq!(report["validation"]["error_count"], 3);
    assert_eq!(report["validation"]["warning_count"], 1);
}

#[test]
fn parse_honours_explicit_format() {
    let input = temp_file("<Order/>");
    let schema = path_arg(&testdata_path("schemas/x12_850.yaml"));
    let output = run(&["parse", &path_arg(input.path()), "-s", &schema, "-f", "flat"]);

    assert_exit_code(&output, 0);

    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(report["format"], "flat_file");
    assert_eq!(report["validation"]["is_valid"], false);
}

#[test]
fn parse_fails_on_empty_input() {
    let input = temp_file("");
    let schema = path_arg(&testdata_path("schemas/x12_850.yaml"));
    let output = run(&["parse", &path_arg(input.path()), "-s", &schema]);

    assert_exit_code(&output, 1);
    assert!(String::from_utf8_lossy(&output.stderr).contains("empty"));
}

#[test]
fn parse_fails_on_missing_schema_file() {
    let input = path_arg(&testdata_path("x12/po_valid.edi"));
    let output = run(&["parse", &input, "-s", "/nonexistent/schema.yaml"]);

    assert_exit_code(&output, 1);
    assert!(String::from_utf8_lossy(&output.stderr).contains("loading schema"));
}

#[test]
fn validate_succeeds_for_clean_documents() {
    let input = path_arg(&testdata_path("x12/po_valid.edi"));
    let schema = path_arg(&testdata_path("schemas/x12_850.yaml"));
    let output = run(&["validate", &input, "-s", &schema]);

    assert_exit_code(&output, 0);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("VALID: 0 error(s), 0 warning(s)"));
    assert!(stdout.contains("1 of 1 file(s) valid"));
}

#[test]
fn validate_reports_each_file_and_fails_if_any_invalid() {
    let valid = path_arg(&testdata_path("x12/po_valid.edi"));
    let invalid = path_arg(&testdata_path("x12/po_invalid.edi"));
    let schema = path_arg(&testdata_path("schemas/x12_850.yaml"));
    let output = run(&["validate", &valid, &invalid, "-s", &schema]);

    assert_exit_code(&output, 1);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("INVALID: 3 error(s), 1 warning(s)"));
    assert!(stdout.contains("UnrecognizedSegment"));
    assert!(stdout.contains("[Warning]"));
    assert!(stdout.contains("1 of 2 file(s) valid"));
}

#[test]
fn validate_errors_only_hides_warning_lines() {
    let invalid = path_arg(&testdata_path("x12/po_invalid.edi"));
    let schema = path_arg(&testdata_path("schemas/x12_850.yaml"));
    let output = run(&["validate", &invalid, "-s", &schema, "--errors-only"]);

    assert_exit_code(&output, 1);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("1 warning(s)"));
    assert!(!stdout.contains("[Warning]"));
}

#[test]
fn config_file_sets_default_format_and_pretty() {
    let config = temp_file("default_format: xml\npretty: true\n");
    let input = path_arg(&testdata_path("xml/order_valid.xml"));
    let schema = path_arg(&testdata_path("schemas/order.json"));
    let output = run(&[
        "--config",
        &path_arg(config.path()),
        "parse",
        &input,
        "-s",
        &schema,
    ]);

    assert_exit_code(&output, 0);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.lines().count() > 1);
    let report: serde_json::Value = serde_json::from_str(&stdout).expect("stdout should be JSON");
    assert_eq!(report["validation"]["is_valid"], true);
}
