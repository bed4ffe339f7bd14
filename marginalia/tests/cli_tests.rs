mod common;

use std::path::Path;
use std::process::Command;

use serde_json::Value;

use common::{html_file, sectioned_page};

const PAGE: &str = r#"<html><body>
    <section id="intro"><p class="note">First note.</p></section>
    <section id="details"><p class="note">Second note.</p></section>
</body></html>"#;

fn run(args: &[&str]) -> Value {
    let output = Command::new(env!("CARGO_BIN_EXE_marginalia"))
        .args(args)
        .env_remove("CHUNK_MAX_CHARS")
        .env_remove("CHUNK_MIN_CHARS")
        .env_remove("FUZZY_THRESHOLD")
        .output()
        .expect("failed to run marginalia");

    assert!(
        output.status.success(),
        "marginalia {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("temp path should be UTF-8")
}

#[test]
fn test_validate_command() {
    let file = html_file(PAGE);
    let path = path_str(file.path());

    let report = run(&["validate", path, "p.note"]);
    assert_eq!(report["is_valid"], Value::Bool(false));
    assert_eq!(report["match_count"], 2);

    let report = run(&["validate", path, "#details > p.note", "--text", "Second"]);
    assert_eq!(report["is_valid"], Value::Bool(true));
    assert_eq!(report["matched_xpath"], "/html/body/section[2]/p");
}

#[test]
fn test_repair_command() {
    let file = html_file(PAGE);
    let path = path_str(file.path());

    let outcome = run(&["repair", path, "--text", "Second note", "--selector", "p.note"]);
    assert_eq!(outcome["succeeded"], Value::Bool(true));
    assert_eq!(outcome["css_selector"], "#details > p.note");

    let outcome = run(&["repair", path, "--text", "absent text entirely", "--selector", "p.note"]);
    assert_eq!(outcome["succeeded"], Value::Bool(false));
    assert_eq!(outcome["css_selector"], "p.note");
}

#[test]
fn test_chunk_command() {
    let file = html_file(&sectioned_page(2, 2, 10));

    let chunks = run(&["chunk", path_str(file.path())]);
    let chunks = chunks.as_array().expect("chunk list");
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0]["total_chunks"], 1);
}

#[test]
fn test_missing_file_fails() {
    let output = Command::new(env!("CARGO_BIN_EXE_marginalia"))
        .args(["chunk", "/definitely/not/here.html"])
        .output()
        .expect("failed to run marginalia");

    assert!(!output.status.success());
}
