use ghaw::core::context::CompilerContext;
use ghaw::core::error::AppError;
use ghaw::core::workflow::validate::Severity;
use ghaw::core::workflow::{build_model, parse_source, Compiler, SemanticValidator};
use ghaw::core::CompilerConfig;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn workflow(root: &Path, name: &str, content: &str) -> PathBuf {
    let dir = root.join(".github").join("workflows");
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn build(content: &str, strict: bool) -> (Result<Vec<String>, AppError>, CompilerContext) {
    let dir = TempDir::new().unwrap();
    let path = workflow(dir.path(), "check.md", content);
    let config = CompilerConfig {
        strict,
        ..CompilerConfig::default()
    };
    let context = CompilerContext::new();
    let result = Compiler::new(config).build(&path, &context).map(|compiled| compiled.jobs);
    (result, context)
}

fn codes(err: &AppError) -> Vec<String> {
    err.leaves().iter().map(|leaf| leaf.code.clone()).collect()
}

#[test]
fn test_strict_flag_rejects_write_permissions() {
    let text = "---\non: push\npermissions:\n  contents: write\n  issues: write\n---\nGo\n";
    let (relaxed, _) = build(text, false);
    assert!(relaxed.is_ok());

    let (strict, _) = build(text, true);
    let err = strict.unwrap_err();
    assert_eq!(codes(&err), vec!["AW-SEM-032", "AW-SEM-032"]);
    let rendered = err.to_string();
    assert!(rendered.contains("permissions.contents"), "{}", rendered);
    assert!(rendered.contains("permissions.issues"), "{}", rendered);
}

#[test]
fn test_front_matter_strict_enables_strict_rules() {
    let (result, _) = build("---\non: push\nstrict: true\nnetwork:\n  allowed: [\"*\"]\n---\nGo\n", false);
    let err = result.unwrap_err();
    assert_eq!(codes(&err), vec!["AW-SEM-033"]);
}

#[test]
fn test_sandbox_disabled_warns_outside_strict() {
    let (result, context) = build("---\non: push\nsandbox: false\n---\nGo\n", false);
    assert!(result.is_ok());
    assert!(context
        .warning_messages()
        .iter()
        .any(|message| message.starts_with("[AW-SEM-030] sandbox:")));
}

#[test]
fn test_all_errors_reported_together() {
    let (result, _) = build(
        "---\non: issues\ntracker-id: tiny\nsafe-outputs:\n  add-comment:\n    target: \"0\"\n---\nGo\n",
        false,
    );
    let err = result.unwrap_err();
    assert_eq!(err.count(), 2);
    assert_eq!(codes(&err), vec!["AW-SEM-001", "AW-SEM-004"]);
    assert!(err.to_string().contains("invalid target value for add-comment: \"0\""));
}

#[test]
fn test_unknown_feature_is_a_warning() {
    let (result, context) = build("---\non: push\nfeatures:\n  shiny: true\n---\nGo\n", false);
    assert!(result.is_ok());
    assert!(context
        .warning_messages()
        .iter()
        .any(|message| message == "[AW-SEM-003] features.shiny: unknown feature 'shiny' is passed through unchecked"));
}

#[test]
fn test_findings_are_sorted_by_severity_then_code() {
    let doc = parse_source(
        "---\non: push\nsandbox: false\nnetwork:\n  firewall: false\ntracker-id: x\nfeatures:\n  action-tag: abc\n---\nGo\n",
        Path::new("sorted.md"),
    )
    .unwrap();
    let model = build_model(&doc, &CompilerContext::new(), false).unwrap();
    let findings = SemanticValidator::new().run(&model);
    let order: Vec<(Severity, &str)> = findings
        .iter()
        .map(|finding| (finding.severity, finding.code.as_str()))
        .collect();
    assert_eq!(
        order,
        vec![
            (Severity::Error, "AW-SEM-002"),
            (Severity::Error, "AW-SEM-004"),
            (Severity::Warning, "AW-SEM-030"),
            (Severity::Warning, "AW-SEM-031"),
        ]
    );
}

#[test]
fn test_unlisted_action_tag_warns_unless_strict() {
    let text = "---\non: push\nsteps:\n  - uses: someone/setup-thing@v3\n  - uses: actions/setup-node@v6\n---\nGo\n";
    let dir = TempDir::new().unwrap();
    let path = workflow(dir.path(), "pins.md", text);

    let context = CompilerContext::new();
    let compiled = Compiler::new(CompilerConfig::default()).build(&path, &context).unwrap();
    assert!(context
        .warning_messages()
        .iter()
        .any(|message| message.contains("someone/setup-thing@v3") && message.contains("not pinned")));
    assert!(compiled.lock_content.contains("someone/setup-thing@v3"));
    assert!(compiled
        .lock_content
        .contains("actions/setup-node@2028fbc5c25fe9cf00d9f06a71cc4710d4507903"));

    let (strict, _) = build(text, true);
    assert!(codes(&strict.unwrap_err()).contains(&"AW-VAL-130".to_string()));
}
