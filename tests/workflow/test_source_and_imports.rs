use ghaw::core::workflow::imports::{extract_section, parse_directive, ImportResolver};
use ghaw::core::workflow::source::{parse_source, read_source};
use ghaw::core::workflow::SourceDocument;
use serde_yaml::Value;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(root: &Path, name: &str, content: &str) {
    let path = root.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn resolve(root: &Path, name: &str) -> SourceDocument {
    let doc = read_source(&root.join(name)).unwrap();
    ImportResolver::new().resolve(doc).unwrap()
}

fn strings(value: &Value) -> Vec<&str> {
    value
        .as_sequence()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect()
}

#[test]
fn test_document_without_front_matter_is_all_body() {
    let doc = parse_source("Just a prompt.\n", Path::new("plain.md")).unwrap();
    assert!(doc.front_matter.is_empty());
    assert_eq!(doc.body, "Just a prompt.\n");
    assert_eq!(doc.stem(), "plain");
}

#[test]
fn test_crlf_and_bom_are_normalized() {
    let doc = parse_source("\u{feff}---\r\non: push\r\n---\r\nBody\r\n", Path::new("x.md")).unwrap();
    assert_eq!(doc.front_matter.get("on"), Some(&Value::from("push")));
    assert_eq!(doc.body, "Body\n");
}

#[test]
fn test_unterminated_front_matter_fails() {
    let err = parse_source("---\non: push\nBody\n", Path::new("x.md")).unwrap_err();
    assert_eq!(err.code, "AW-VAL-001");
    assert!(err.to_string().contains("not terminated"));
}

#[test]
fn test_imports_merge_with_importer_winning() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "shared/tools.md",
        "---\ntimeout-minutes: 5\ntools:\n  bash: [\"ls\"]\nnetwork:\n  allowed: [python]\n---\nShared guidance.\n",
    );
    write(
        dir.path(),
        "main.md",
        "---\non: push\ntimeout-minutes: 30\nimports:\n  - shared/tools.md\ntools:\n  bash: [\"echo\"]\n---\nMain prompt.\n",
    );

    let doc = resolve(dir.path(), "main.md");
    let fm = &doc.front_matter;
    assert!(fm.get("imports").is_none());
    assert_eq!(fm.get("timeout-minutes"), Some(&Value::from(30)));
    assert_eq!(strings(&fm["tools"]["bash"]), vec!["echo", "ls"]);
    assert_eq!(strings(&fm["network"]["allowed"]), vec!["python"]);
    assert!(doc.body.starts_with("Main prompt.\n"));
    assert!(doc.body.contains("Shared guidance."));
}

#[test]
fn test_import_cycle_terminates() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.md", "---\non: push\nimports: [b.md]\n---\nAlpha\n");
    write(dir.path(), "b.md", "---\nimports: [a.md]\n---\nBeta\n");
    let doc = resolve(dir.path(), "a.md");
    assert!(doc.body.contains("Alpha"));
    assert!(doc.body.contains("Beta"));
    assert_eq!(doc.body.matches("Alpha").count(), 1);
}

#[test]
fn test_missing_import_is_reported() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "main.md", "---\nimports: [nope.md]\n---\nX\n");
    let doc = read_source(&dir.path().join("main.md")).unwrap();
    let err = ImportResolver::new().resolve(doc).unwrap_err();
    assert_eq!(err.code, "AW-VAL-030");
    assert!(err.to_string().contains("import file not found"));
}

#[test]
fn test_imported_steps_run_before_own_steps() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "setup.md",
        "---\nsteps:\n  - name: Imported\n    run: echo imported\n---\n",
    );
    write(
        dir.path(),
        "main.md",
        "---\nimports: [setup.md]\nsteps:\n  - name: Own\n    run: echo own\n---\nX\n",
    );
    let doc = resolve(dir.path(), "main.md");
    let names: Vec<&str> = doc.front_matter["steps"]
        .as_sequence()
        .unwrap()
        .iter()
        .filter_map(|step| step.get("name").and_then(Value::as_str))
        .collect();
    assert_eq!(names, vec!["Imported", "Own"]);
}

#[test]
fn test_conflicting_mcp_server_imports_fail() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "one.md",
        "---\nmcp-servers:\n  notion:\n    command: npx\n    allowed: [search]\n---\n",
    );
    write(
        dir.path(),
        "two.md",
        "---\nmcp-servers:\n  notion:\n    command: uvx\n    allowed: [fetch]\n---\n",
    );
    write(dir.path(), "main.md", "---\nimports: [one.md, two.md]\n---\nX\n");
    let doc = read_source(&dir.path().join("main.md")).unwrap();
    let err = ImportResolver::new().resolve(doc).unwrap_err();
    assert!(err.to_string().contains("conflict"), "{}", err);
}

#[test]
fn test_mcp_allowed_lists_are_unioned() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "one.md",
        "---\nmcp-servers:\n  notion:\n    command: npx\n    allowed: [search]\n---\n",
    );
    write(
        dir.path(),
        "two.md",
        "---\nmcp-servers:\n  notion:\n    command: npx\n    allowed: [fetch, search]\n---\n",
    );
    write(dir.path(), "main.md", "---\nimports: [one.md, two.md]\n---\nX\n");
    let doc = resolve(dir.path(), "main.md");
    assert_eq!(
        strings(&doc.front_matter["mcp-servers"]["notion"]["allowed"]),
        vec!["search", "fetch"]
    );
}

#[test]
fn test_body_include_splices_section() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "shared/guide.md",
        "# Intro\nskip me\n## Rules\nBe kind.\n## Other\nnot this\n",
    );
    write(
        dir.path(),
        "main.md",
        "---\non: push\n---\nBefore\n@include shared/guide.md#Rules\nAfter\n",
    );
    let doc = resolve(dir.path(), "main.md");
    assert_eq!(doc.body, "Before\n## Rules\nBe kind.\nAfter\n");
}

#[test]
fn test_optional_include_may_be_missing() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "main.md", "---\non: push\n---\nA\n@include? missing.md\nB\n");
    let doc = resolve(dir.path(), "main.md");
    assert_eq!(doc.body, "A\nB\n");
}

#[test]
fn test_directive_and_section_helpers() {
    let directive = parse_directive("{{#import? shared/x.md#Setup}}").unwrap();
    assert!(directive.optional);
    assert_eq!(directive.path, "shared/x.md");
    assert_eq!(directive.section.as_deref(), Some("Setup"));
    assert!(parse_directive("see @include docs").is_none());
    assert_eq!(
        extract_section("## A\none\n### A.1\ntwo\n## B\n", "A").as_deref(),
        Some("## A\none\n### A.1\ntwo\n")
    );
}
