use ghaw::core::context::CompilerContext;
use ghaw::core::error::AppError;
use ghaw::core::workflow::jobs::{handler_condition, Job, JobManager};
use ghaw::core::workflow::{CompiledWorkflow, Compiler};
use ghaw::core::CompilerConfig;
use serde_yaml::Value;
use std::fs;
use tempfile::TempDir;

fn compile(source: &str) -> Result<CompiledWorkflow, AppError> {
    let dir = TempDir::new().unwrap();
    let workflows = dir.path().join(".github").join("workflows");
    fs::create_dir_all(&workflows).unwrap();
    let path = workflows.join("graph.md");
    fs::write(&path, source).unwrap();
    Compiler::new(CompilerConfig::default()).build(&path, &CompilerContext::new())
}

fn job(id: &str, needs: &[&str]) -> Job {
    let mut job = Job::new(id, Value::from("ubuntu-latest"));
    job.needs = needs.iter().map(|need| need.to_string()).collect();
    job
}

#[test]
fn test_minimal_workflow_has_two_jobs() {
    let compiled = compile("---\non: push\n---\nSay hello.\n").unwrap();
    assert_eq!(compiled.jobs, vec!["activation", "agent"]);
    assert!(compiled.lock_content.contains("#   activation --> agent\n"));
}

#[test]
fn test_handlers_and_safe_jobs_are_ordered() {
    let compiled = compile(
        "---\non: issues\nsafe-outputs:\n  create-issue:\n  add-comment:\n  jobs:\n    notify:\n      needs: [create_issue]\n      steps:\n        - run: echo done\n---\nTriage.\n",
    )
    .unwrap();
    assert_eq!(
        compiled.jobs,
        vec!["activation", "agent", "add_comment", "create_issue", "missing_tool", "notify"]
    );
    let lock = &compiled.lock_content;
    assert!(lock.contains("#   agent --> create_issue\n"));
    assert!(lock.contains("#   create_issue --> notify\n"));

    let parsed: Value = serde_yaml::from_str(lock).unwrap();
    let issue = &parsed["jobs"]["create_issue"];
    assert_eq!(issue["needs"], Value::from("agent"));
    assert_eq!(issue["if"], Value::from(handler_condition("create_issue")));
    assert_eq!(issue["permissions"]["issues"], Value::from("write"));
    let notify_needs = parsed["jobs"]["notify"]["needs"].as_sequence().unwrap();
    assert_eq!(notify_needs, &vec![Value::from("agent"), Value::from("create_issue")]);
}

#[test]
fn test_safe_job_with_unknown_dependency_fails() {
    let err = compile(
        "---\non: push\nsafe-outputs:\n  jobs:\n    notify:\n      needs: [ghost]\n      steps:\n        - run: echo\n---\nGo\n",
    )
    .unwrap_err();
    assert_eq!(err.code, "AW-VAL-141");
    assert!(err.to_string().contains("depends on non-existent job 'ghost'"));
}

#[test]
fn test_safe_job_cycle_fails() {
    let err = compile(
        "---\non: push\nsafe-outputs:\n  jobs:\n    first:\n      needs: [second]\n      steps:\n        - run: echo\n    second:\n      needs: [first]\n      steps:\n        - run: echo\n---\nGo\n",
    )
    .unwrap_err();
    assert_eq!(err.code, "AW-VAL-142");
    assert!(err.to_string().contains("cycle detected between jobs: first -> second"));
}

#[test]
fn test_safe_job_name_collision() {
    let err = compile(
        "---\non: push\nsafe-outputs:\n  jobs:\n    agent:\n      steps:\n        - run: echo\n---\nGo\n",
    )
    .unwrap_err();
    assert_eq!(err.code, "AW-VAL-143");
}

#[test]
fn test_manager_reports_every_problem() {
    let mut manager = JobManager::new();
    manager.add_job(job("a", &["b", "missing"])).unwrap();
    manager.add_job(job("b", &["a"])).unwrap();
    let err = manager.validate_dependencies().unwrap_err();
    assert_eq!(err.count(), 2);
    assert_eq!(manager.add_job(job("a", &[])).unwrap_err().code, "AW-VAL-140");
}

#[test]
fn test_edges_follow_topological_order() {
    let mut manager = JobManager::new();
    manager.add_job(job("report", &["agent", "activation"])).unwrap();
    manager.add_job(job("agent", &["activation"])).unwrap();
    manager.add_job(job("activation", &[])).unwrap();
    assert_eq!(
        manager.edges().unwrap(),
        vec![
            ("activation".to_string(), "agent".to_string()),
            ("agent".to_string(), "report".to_string()),
            ("activation".to_string(), "report".to_string()),
        ]
    );
}
