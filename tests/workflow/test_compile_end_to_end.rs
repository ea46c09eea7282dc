use ghaw::core::context::CompilerContext;
use ghaw::core::error::AppError;
use ghaw::core::workflow::safe_outputs::TOOLS_FILE;
use ghaw::core::workflow::{CompiledWorkflow, Compiler};
use ghaw::core::CompilerConfig;
use serde_yaml::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const TRIAGE: &str = "---
on:
  issues:
    types: [opened]
permissions:
  contents: read
safe-outputs:
  create-issue:
    title-prefix: \"[triage] \"
---
# Issue triage

Read issue #${{ github.event.issue.number }} and file a follow-up.
";

struct Repo {
    dir: TempDir,
}

impl Repo {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join(".github").join("workflows")).unwrap();
        Repo { dir }
    }

    fn workflows(&self) -> PathBuf {
        self.dir.path().join(".github").join("workflows")
    }

    fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.workflows().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn aux(&self, stem: &str) -> PathBuf {
        self.workflows().join("aw").join(stem)
    }
}

fn compile(path: &Path) -> Result<CompiledWorkflow, AppError> {
    Compiler::new(CompilerConfig::default()).compile_file(path, &CompilerContext::new())
}

fn dependency_graph(lock: &str) -> String {
    let mut lines = Vec::new();
    let mut fences = 0;
    for line in lock.lines().skip_while(|line| *line != "# Job Dependency Graph:") {
        lines.push(line);
        if line.starts_with("# ```") {
            fences += 1;
            if fences == 2 {
                break;
            }
        }
    }
    lines.join("\n")
}

#[test]
fn test_lock_and_helpers_are_written() {
    let repo = Repo::new();
    let source = repo.write("triage.md", TRIAGE);
    let compiled = compile(&source).unwrap();

    assert_eq!(compiled.lock_path, repo.workflows().join("triage.lock.yml"));
    let on_disk = fs::read_to_string(&compiled.lock_path).unwrap();
    assert_eq!(on_disk, compiled.lock_content);
    assert!(on_disk.contains("# Source: .github/workflows/triage.md"));

    let aux = repo.aux("triage");
    for helper in [
        "create_issue.cjs",
        "load_agent_output.cjs",
        "staged_preview.cjs",
        "missing_tool.cjs",
        TOOLS_FILE,
    ] {
        assert!(aux.join(helper).is_file(), "{} missing", helper);
    }
    let tools: serde_json::Value = serde_json::from_str(&fs::read_to_string(aux.join(TOOLS_FILE)).unwrap()).unwrap();
    assert!(tools.is_array());
}

#[test]
fn test_dependency_graph_header() {
    let repo = Repo::new();
    let compiled = compile(&repo.write("triage.md", TRIAGE)).unwrap();
    insta::assert_snapshot!(dependency_graph(&compiled.lock_content), @r#"
    # Job Dependency Graph:
    # ```mermaid
    # graph LR
    #   activation["activation"]
    #   agent["agent"]
    #   create_issue["create_issue"]
    #   missing_tool["missing_tool"]
    #   activation --> agent
    #   agent --> create_issue
    #   agent --> missing_tool
    # ```
    "#);
}

#[test]
fn test_lock_document_shape() {
    let repo = Repo::new();
    let compiled = compile(&repo.write("triage.md", TRIAGE)).unwrap();
    let lock: Value = serde_yaml::from_str(&compiled.lock_content).unwrap();

    let keys: Vec<&str> = lock
        .as_mapping()
        .unwrap()
        .keys()
        .filter_map(Value::as_str)
        .collect();
    assert_eq!(keys.first(), Some(&"name"));
    assert_eq!(keys.last(), Some(&"jobs"));
    assert_eq!(lock["name"], Value::from("triage"));
    assert_eq!(lock["on"]["issues"]["types"], serde_yaml::from_str::<Value>("[opened]").unwrap());
    assert_eq!(lock["permissions"], Value::Mapping(Default::default()));
    assert_eq!(lock["concurrency"]["group"], Value::from("gh-aw-${{ github.workflow }}"));
    assert_eq!(lock["jobs"]["agent"]["permissions"]["contents"], Value::from("read"));
}

#[test]
fn test_prompt_expressions_are_lifted() {
    let repo = Repo::new();
    let compiled = compile(&repo.write("triage.md", TRIAGE)).unwrap();
    let lock = &compiled.lock_content;
    assert!(lock.contains("__GH_AW_GITHUB_EVENT_ISSUE_NUMBER__"));
    assert!(lock.contains("GH_AW_GITHUB_EVENT_ISSUE_NUMBER: ${{ github.event.issue.number }}"));
}

#[test]
fn test_secret_in_prompt_is_rejected() {
    let repo = Repo::new();
    let source = repo.write("leaky.md", "---\non: push\n---\nUse ${{ secrets.DEPLOY_KEY }} to deploy.\n");
    let err = compile(&source).unwrap_err();
    assert_eq!(err.code, "AW-VAL-150");
    assert!(!repo.workflows().join("leaky.lock.yml").exists());
}

#[test]
fn test_recompile_is_stable() {
    let repo = Repo::new();
    let source = repo.write("triage.md", TRIAGE);
    let first = compile(&source).unwrap();
    let second = compile(&source).unwrap();
    assert_eq!(first.lock_content, second.lock_content);
    assert_eq!(first.aux_files, second.aux_files);
    assert!(!second.write(true).unwrap());
}

#[test]
fn test_stale_helpers_are_removed() {
    let repo = Repo::new();
    let source = repo.write("triage.md", TRIAGE);
    compile(&source).unwrap();
    assert!(repo.aux("triage").join("create_issue.cjs").is_file());

    repo.write("triage.md", "---\non:\n  issues:\n    types: [opened]\n---\nJust read the issue.\n");
    compile(&source).unwrap();
    let aux = repo.aux("triage");
    assert!(!aux.join("create_issue.cjs").exists());
    assert!(!aux.join(TOOLS_FILE).exists());
}

#[test]
fn test_engine_selection_changes_execution_step() {
    let repo = Repo::new();
    let copilot = compile(&repo.write("default.md", "---\non: push\n---\nGo.\n")).unwrap();
    assert!(copilot.lock_content.contains("name: Execute GitHub Copilot CLI"));

    let claude = compile(&repo.write("claude.md", "---\non: push\nengine: claude\n---\nGo.\n")).unwrap();
    assert!(claude.lock_content.contains("name: Execute Claude Code CLI"));
    assert!(!claude.lock_content.contains("Execute GitHub Copilot CLI"));
}

#[test]
fn test_validation_only_build_writes_nothing() {
    let repo = Repo::new();
    let source = repo.write("triage.md", TRIAGE);
    let compiled = Compiler::new(CompilerConfig::default())
        .build(&source, &CompilerContext::new())
        .unwrap();
    assert!(!compiled.lock_content.is_empty());
    assert!(!compiled.lock_path.exists());
    assert!(!repo.aux("triage").exists());
}

fn agent_step<'v>(lock: &'v Value, name: &str) -> Option<&'v Value> {
    lock["jobs"]["agent"]["steps"]
        .as_sequence()
        .unwrap()
        .iter()
        .find(|step| step.get("name").and_then(Value::as_str) == Some(name))
}

#[test]
fn test_claude_allow_list_reaches_lock() {
    let repo = Repo::new();
    let source = repo.write(
        "builder.md",
        "---\non: push\nengine: claude\ntools:\n  bash: [make]\n  edit:\n  web-fetch:\n---\nBuild it.\n",
    );
    let compiled = compile(&source).unwrap();
    let line = compiled
        .lock_content
        .lines()
        .find(|line| line.contains("--allowed-tools"))
        .expect("claude run line carries an allow-list");
    for tool in ["Bash(make)", "Edit", "Write", "WebFetch"] {
        assert!(line.contains(tool), "{} missing from {}", tool, line);
    }
}

#[test]
fn test_pull_request_runs_check_out_the_pr_branch() {
    let repo = Repo::new();
    let source = repo.write(
        "review.md",
        "---\non:\n  pull_request:\n    types: [ready_for_review]\npermissions:\n  contents: read\n  pull-requests: read\n---\nReview the change.\n",
    );
    let compiled = compile(&source).unwrap();
    let lock: Value = serde_yaml::from_str(&compiled.lock_content).unwrap();

    let step = agent_step(&lock, "Checkout PR branch").expect("PR checkout step");
    assert!(step["uses"].as_str().unwrap().starts_with("actions/github-script@"));
    assert!(step["if"].as_str().unwrap().contains("github.event.pull_request"));
    assert!(step["with"]["script"].as_str().unwrap().contains("checkout_pr_branch.cjs"));
    assert!(repo.aux("review").join("checkout_pr_branch.cjs").is_file());

    let names: Vec<&str> = lock["jobs"]["agent"]["steps"]
        .as_sequence()
        .unwrap()
        .iter()
        .filter_map(|step| step.get("name").and_then(Value::as_str))
        .collect();
    let checkout = names.iter().position(|name| *name == "Checkout PR branch").unwrap();
    let configure = names.iter().position(|name| *name == "Configure Git credentials").unwrap();
    assert!(configure < checkout);
}

#[test]
fn test_pr_checkout_needs_pr_trigger_and_contents() {
    let repo = Repo::new();
    let issues = compile(&repo.write("triage.md", TRIAGE)).unwrap();
    assert!(!issues.lock_content.contains("Checkout PR branch"));

    let unreadable = compile(&repo.write(
        "comment.md",
        "---\non:\n  issue_comment:\n    types: [created]\npermissions:\n  issues: read\n---\nAnswer the comment.\n",
    ))
    .unwrap();
    assert!(!unreadable.lock_content.contains("Checkout PR branch"));
    assert!(!repo.aux("comment").join("checkout_pr_branch.cjs").exists());
}

#[test]
fn test_front_matter_secrets_are_redacted() {
    let repo = Repo::new();
    let source = repo.write(
        "deploy.md",
        "---\non: push\nenv:\n  DEPLOY_TOKEN: ${{ secrets.DEPLOY_TOKEN }}\n---\nDeploy.\n",
    );
    let compiled = compile(&source).unwrap();
    let lock: Value = serde_yaml::from_str(&compiled.lock_content).unwrap();
    let redact = agent_step(&lock, "Redact secrets in logs").unwrap();
    assert!(redact["env"]["GH_AW_SECRET_NAMES"].as_str().unwrap().contains("DEPLOY_TOKEN"));
    assert_eq!(redact["env"]["SECRET_DEPLOY_TOKEN"], Value::from("${{ secrets.DEPLOY_TOKEN }}"));
}
