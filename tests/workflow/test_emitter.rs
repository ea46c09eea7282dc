use ghaw::core::workflow::emit::{render_text, render_workflow, yaml_scalar, LockDocument, LockHeader};
use ghaw::core::workflow::jobs::Job;
use ghaw::core::workflow::model::{PermissionLevel, PermissionSet};
use ghaw::core::workflow::steps::Step;
use indexmap::IndexMap;
use serde_yaml::Value;

const EXPECTED: &str = r#"# This file was automatically generated by ghaw (v1.2.3). DO NOT EDIT.
#
# To update this file, edit the source workflow and run:
#   ghaw compile
#
# Source: .github/workflows/demo.md
# frontmatter-hash: abc123
#
# Greets the team.
#
# Job Dependency Graph:
# ```mermaid
# graph LR
#   activation["activation"]
#   agent["agent"]
#   activation --> agent
# ```

name: Demo
"on": push

permissions: {}

run-name: Demo

jobs:
  activation:
    runs-on: ubuntu-latest
    permissions:
      contents: read
    outputs:
      activated: ${{ steps.gate.outputs.ok }}
    timeout-minutes: 5
    steps:
      - name: Say hi
        id: gate
        run: echo hi

  agent:
    needs: activation
    if: needs.activation.outputs.activated == 'true'
    runs-on: ubuntu-latest
    permissions: {}
    env:
      MODE: "true"
    steps:
      - name: Checkout
        uses: actions/checkout@08c6903cd8c0fde910a37f88322edcfb5dd907a8 # v5
        with:
          fetch-depth: "1"
"#;

fn jobs() -> (Job, Job) {
    let mut activation = Job::new("activation", Value::from("ubuntu-latest"));
    activation.permissions = PermissionSet::from_pairs(&[("contents", PermissionLevel::Read)]);
    activation
        .outputs
        .insert("activated".into(), "${{ steps.gate.outputs.ok }}".into());
    activation.timeout_minutes = Some(5);
    activation.push(Step::run("Say hi", "echo hi").id("gate"));

    let mut agent = Job::new("agent", Value::from("ubuntu-latest"));
    agent.needs = vec!["activation".into()];
    agent.if_condition = Some("needs.activation.outputs.activated == 'true'".into());
    agent.env.insert("MODE".into(), "true".into());
    agent.push(
        Step::uses("Checkout", "actions/checkout@08c6903cd8c0fde910a37f88322edcfb5dd907a8 # v5")
            .input("fetch-depth", "1"),
    );
    (activation, agent)
}

fn header() -> LockHeader {
    LockHeader {
        source: ".github/workflows/demo.md".into(),
        version: "v1.2.3".into(),
        frontmatter_hash: "abc123".into(),
        description: Some("Greets the team.".into()),
        edges: vec![("activation".into(), "agent".into())],
        jobs: vec!["activation".into(), "agent".into()],
    }
}

#[test]
fn test_full_document_layout() {
    let (activation, agent) = jobs();
    let on = Value::from("push");
    let env = IndexMap::new();
    let document = LockDocument {
        header: header(),
        name: "Demo",
        on: &on,
        concurrency: None,
        env: &env,
        jobs: vec![&activation, &agent],
    };
    assert_eq!(render_workflow(&document).unwrap(), EXPECTED);
}

#[test]
fn test_output_parses_as_workflow_yaml() {
    let (activation, agent) = jobs();
    let on: Value = serde_yaml::from_str("issues:\n  types: [opened, labeled]\nworkflow_dispatch: {}\n").unwrap();
    let mut env = IndexMap::new();
    env.insert("GH_AW_ASSETS".to_string(), "/tmp/gh-aw/assets: shared".to_string());
    let concurrency: Value = serde_yaml::from_str("group: triage\ncancel-in-progress: true\n").unwrap();
    let document = LockDocument {
        header: header(),
        name: "Triage: bugs",
        on: &on,
        concurrency: Some(concurrency),
        env: &env,
        jobs: vec![&activation, &agent],
    };
    let text = render_workflow(&document).unwrap();
    let parsed: Value = serde_yaml::from_str(&text).unwrap();
    assert_eq!(parsed["name"], Value::from("Triage: bugs"));
    assert_eq!(parsed["on"], on);
    assert_eq!(parsed["concurrency"]["cancel-in-progress"], Value::Bool(true));
    assert_eq!(parsed["env"]["GH_AW_ASSETS"], Value::from("/tmp/gh-aw/assets: shared"));
    assert_eq!(parsed["jobs"]["agent"]["env"]["MODE"], Value::from("true"));
    assert_eq!(
        parsed["jobs"]["agent"]["steps"][0]["uses"],
        Value::from("actions/checkout@08c6903cd8c0fde910a37f88322edcfb5dd907a8")
    );
}

#[test]
fn test_scalars_read_back_unchanged() {
    for text in [
        "plain",
        "yes",
        "On",
        "3.14",
        "0x1F",
        "- dash",
        "key: value",
        "trailing:",
        " padded ",
        "hash #tag",
        "${{ github.run_id }}",
        "quote \" inside",
        "",
    ] {
        let rendered = format!("value: {}", yaml_scalar(text));
        let parsed: Value = serde_yaml::from_str(&rendered).unwrap();
        assert_eq!(parsed["value"], Value::from(text), "{}", rendered);
    }
}

#[test]
fn test_multiline_text_is_literal_block() {
    let lines = render_text("run", "set -e\nif true; then\n  echo ok\nfi\n", 2);
    assert_eq!(lines[0], "  run: |");
    let document = format!("{}\n", lines.join("\n"));
    let parsed: Value = serde_yaml::from_str(&document).unwrap();
    assert_eq!(parsed["run"], Value::from("set -e\nif true; then\n  echo ok\nfi\n"));
}
