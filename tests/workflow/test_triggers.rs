use ghaw::core::context::CompilerContext;
use ghaw::core::error::AppError;
use ghaw::core::workflow::triggers::{lower_triggers, parse_trigger_shorthand, TriggerParseError};
use ghaw::core::workflow::Compiler;
use ghaw::core::CompilerConfig;
use serde_yaml::{Mapping, Value};
use std::fs;
use tempfile::TempDir;

fn yaml(text: &str) -> Value {
    serde_yaml::from_str(text).unwrap()
}

fn compile_lock(source: &str) -> Value {
    let dir = TempDir::new().unwrap();
    let workflows = dir.path().join(".github").join("workflows");
    fs::create_dir_all(&workflows).unwrap();
    let path = workflows.join("trigger.md");
    fs::write(&path, source).unwrap();
    let compiled = Compiler::new(CompilerConfig::default())
        .build(&path, &CompilerContext::new())
        .unwrap();
    serde_yaml::from_str(&compiled.lock_content).unwrap()
}

#[test]
fn test_shorthand_table() {
    let cases: &[(&str, &str, &[&str])] = &[
        ("manual", "workflow_dispatch", &[]),
        ("push to main", "push", &[]),
        ("issue opened", "issues", &["opened"]),
        ("discussion answered", "discussion", &["answered"]),
        ("comment created", "issue_comment", &["created"]),
        ("release published", "release", &["published"]),
        ("repository starred", "watch", &["started"]),
        ("repository forked", "fork", &[]),
        ("api dispatch deploy", "repository_dispatch", &["deploy"]),
        ("security alert", "code_scanning_alert", &["created", "reopened", "fixed"]),
    ];
    for (form, event, types) in cases {
        let ir = parse_trigger_shorthand(form).unwrap().unwrap();
        assert_eq!(ir.event, *event, "{}", form);
        assert_eq!(ir.types, *types, "{}", form);
    }
}

#[test]
fn test_shorthand_filters_and_inputs() {
    let push = parse_trigger_shorthand("push tags v*").unwrap().unwrap();
    assert_eq!(push.filters["tags"], vec!["v*"]);

    let dispatch = parse_trigger_shorthand("manual with input target").unwrap().unwrap();
    let on = dispatch.to_yaml_map();
    assert_eq!(on["workflow_dispatch"]["inputs"]["target"]["type"], Value::from("string"));
    assert_eq!(on["workflow_dispatch"]["inputs"]["target"]["required"], Value::from(false));
}

#[test]
fn test_shorthand_argument_errors() {
    assert_eq!(
        parse_trigger_shorthand("push to"),
        Err(TriggerParseError::MissingArgument {
            form: "push to".to_string(),
            argument: "branch",
        })
    );
    let err: AppError = parse_trigger_shorthand("release exploded").unwrap_err().into();
    assert_eq!(err.code, "AW-VAL-070");
    assert!(err.message.contains("unsupported release activity 'exploded'"));
}

#[test]
fn test_lowering_shapes() {
    assert_eq!(lower_triggers(None).unwrap_err().code, "AW-VAL-071");

    let list = lower_triggers(Some(&yaml("[push, issues]"))).unwrap();
    assert_eq!(list.events, vec!["push", "issues"]);
    assert!(list.has_reactable_event());

    assert_eq!(lower_triggers(Some(&yaml("[push, {issues: {}}]"))).unwrap_err().code, "AW-VAL-072");
    assert_eq!(lower_triggers(Some(&yaml("reaction: eyes"))).unwrap_err().code, "AW-VAL-073");
    assert_eq!(lower_triggers(Some(&yaml("42"))).unwrap_err().code, "AW-VAL-072");
}

#[test]
fn test_choice_input_needs_options() {
    let err = lower_triggers(Some(&yaml(
        "workflow_dispatch:\n  inputs:\n    level:\n      type: choice\n",
    )))
    .unwrap_err();
    assert_eq!(err.code, "AW-VAL-074");
    assert_eq!(err.field.as_deref(), Some("on.workflow_dispatch.inputs.level.options"));
}

#[test]
fn test_shorthand_condition_gates_activation() {
    let lock = compile_lock("---\non: dependabot pull request\n---\nReview the bump.\n");
    assert_eq!(
        lock["on"]["pull_request"]["types"],
        yaml("[opened, synchronize, reopened]")
    );
    assert_eq!(
        lock["jobs"]["activation"]["if"],
        Value::from("github.actor == 'dependabot[bot]'")
    );
}

#[test]
fn test_compiler_keys_never_reach_lock() {
    let lock = compile_lock(
        "---\non:\n  issues:\n    types: [opened]\n  reaction: eyes\n  manual-approval: production\n---\nTriage.\n",
    );
    let on = lock["on"].as_mapping().unwrap();
    assert_eq!(on.len(), 1);
    assert!(on.get("reaction").is_none());
    assert_eq!(lock["jobs"]["activation"]["environment"], Value::from("production"));
}

#[test]
fn test_bare_event_renders_empty_map() {
    let lock = compile_lock("---\non:\n  workflow_dispatch:\n---\nGo\n");
    assert_eq!(lock["on"]["workflow_dispatch"], Value::Mapping(Mapping::new()));
}
