use ghaw::core::context::CompilerContext;
use ghaw::core::workflow::steps::tracker::is_path_scanned;
use ghaw::core::workflow::steps::{Step, StepEntry, StepOrderTracker};
use ghaw::core::workflow::Compiler;
use ghaw::core::CompilerConfig;
use serde_yaml::Value;
use std::fs;
use tempfile::TempDir;

const FULL_WORKFLOW: &str = "---
on:
  issues:
    types: [opened]
permissions:
  contents: read
tools:
  github:
    toolsets: [issues]
  cache-memory: true
steps:
  - name: Prepare data
    run: echo preparing
safe-outputs:
  create-pull-request:
---
Summarize issue ${{ github.event.issue.number }}.
";

fn agent_step_names(source: &str) -> Vec<String> {
    let dir = TempDir::new().unwrap();
    let workflows = dir.path().join(".github").join("workflows");
    fs::create_dir_all(&workflows).unwrap();
    let path = workflows.join("order.md");
    fs::write(&path, source).unwrap();
    let compiled = Compiler::new(CompilerConfig::default())
        .build(&path, &CompilerContext::new())
        .unwrap();
    let lock: Value = serde_yaml::from_str(&compiled.lock_content).unwrap();
    lock["jobs"]["agent"]["steps"]
        .as_sequence()
        .unwrap()
        .iter()
        .filter_map(|step| step.get("name").and_then(Value::as_str).map(str::to_string))
        .collect()
}

fn position(names: &[String], name: &str) -> usize {
    names
        .iter()
        .position(|candidate| candidate == name)
        .unwrap_or_else(|| panic!("step '{}' missing from {:?}", name, names))
}

fn upload(name: &str, path: &str) -> StepEntry {
    Step::uses(name, "actions/upload-artifact@330a01c490aca151604b8cf639adc76d48f6c5d4 # v5")
        .input("path", path)
        .into()
}

fn redaction() -> StepEntry {
    Step::run("Redact secrets in logs", "node redact.cjs").into()
}

#[test]
fn test_agent_steps_follow_pipeline_order() {
    let names = agent_step_names(FULL_WORKFLOW);
    let ordered = [
        "Checkout repository",
        "Create gh-aw temp directory",
        "Create cache-memory directory (default)",
        "Configure Git credentials",
        "Prepare data",
        "Install GitHub Copilot CLI",
        "Setup Safe Outputs Collector MCP",
        "Setup MCPs",
        "Create prompt",
        "Interpolate variables and render templates",
        "Validate prompt placeholders",
        "Execute GitHub Copilot CLI",
        "Ingest agent output",
        "Redact secrets in logs",
        "Upload prompt",
        "Upload Safe Outputs",
        "Upload git patch",
        "Upload MCP logs",
    ];
    let positions: Vec<usize> = ordered.iter().map(|name| position(&names, name)).collect();
    let mut sorted = positions.clone();
    sorted.sort();
    assert_eq!(positions, sorted, "{:?}", names);
}

#[test]
fn test_every_upload_follows_redaction() {
    let names = agent_step_names(FULL_WORKFLOW);
    let redact = position(&names, "Redact secrets in logs");
    for (index, name) in names.iter().enumerate() {
        if name.starts_with("Upload") {
            assert!(index > redact, "{} runs before redaction", name);
        }
    }
}

#[test]
fn test_minimal_workflow_has_no_collection_step() {
    let names = agent_step_names("---\non: push\n---\nHello.\n");
    assert!(!names.contains(&"Ingest agent output".to_string()));
    assert!(!names.contains(&"Setup MCPs".to_string()));
    assert!(names.contains(&"Redact secrets in logs".to_string()));
}

#[test]
fn test_tracker_ignores_steps_before_execution() {
    let mut tracker = StepOrderTracker::new();
    tracker.record(&upload("Early upload", "/home/runner/out.bin"));
    tracker.mark_agent_execution_complete();
    tracker.record(&redaction());
    tracker.record(&upload("Upload logs", "/tmp/gh-aw/logs/"));
    assert!(tracker.validate().is_ok());
}

#[test]
fn test_tracker_requires_redaction() {
    let mut tracker = StepOrderTracker::new();
    tracker.mark_agent_execution_complete();
    tracker.record(&upload("Upload logs", "/tmp/gh-aw/logs/"));
    let err = tracker.validate().unwrap_err();
    assert_eq!(err.code, "AW-BUG-001");
}

#[test]
fn test_tracker_reports_order_and_path_violations() {
    let mut tracker = StepOrderTracker::new();
    tracker.mark_agent_execution_complete();
    tracker.record(&upload("Upload early", "/tmp/gh-aw/early.log"));
    tracker.record(&redaction());
    tracker.record(&upload("Upload binary", "/tmp/gh-aw/core.bin\n/tmp/gh-aw/ok.txt"));
    let err = tracker.validate().unwrap_err();
    let codes: Vec<&str> = err.leaves().iter().map(|leaf| leaf.code.as_str()).collect();
    assert_eq!(codes, vec!["AW-BUG-002", "AW-BUG-003"]);
}

#[test]
fn test_scanned_paths() {
    for path in [
        "/tmp/gh-aw/agent_output.json",
        "/tmp/gh-aw/mcp-logs/",
        "/opt/gh-aw/run.log",
        "/tmp/gh-aw/patch",
        "${{ env.GH_AW_SAFE_OUTPUTS }}",
    ] {
        assert!(is_path_scanned(path), "{}", path);
    }
    for path in ["/tmp/other/out.json", "/tmp/gh-aw/../etc/passwd", "/tmp/gh-aw/aw.patch", "/tmp/gh-aw/a.zip"] {
        assert!(!is_path_scanned(path), "{}", path);
    }
}
