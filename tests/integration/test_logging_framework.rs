use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const WORKFLOW: &str = "---\non: push\n---\n# Daily summary\n\nSummarize yesterday's activity.\n";

fn repo_with_workflow() -> TempDir {
    let dir = TempDir::new().expect("failed to create temp dir");
    let workflows = dir.path().join(".github").join("workflows");
    fs::create_dir_all(&workflows).unwrap();
    fs::write(workflows.join("daily.md"), WORKFLOW).unwrap();
    dir
}

fn write_logging_config(root: &Path, content: &str) {
    let dir = root.join(".ghaw").join("config");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("logging.toml"), content).unwrap();
}

fn log_file(root: &Path) -> PathBuf {
    root.join(".ghaw").join("logs").join("ghaw.log")
}

fn ghaw(root: &Path) -> Command {
    let mut cmd = Command::cargo_bin("ghaw").expect("binary builds");
    cmd.current_dir(root)
        .env_remove("CI")
        .env_remove("GITHUB_ACTIONS")
        .env_remove("RUST_LOG")
        .env_remove("GHAW_LOG_LEVEL")
        .env_remove("GHAW_LOG_CONSOLE")
        .env_remove("GH_AW_FEATURES");
    cmd
}

#[test]
fn local_dev_writes_file_sink_when_enabled() {
    let repo = repo_with_workflow();
    write_logging_config(
        repo.path(),
        "[logging]\nenable_file = true\ndefault_level = \"debug\"\n",
    );

    ghaw(repo.path()).arg("validate").assert().success();

    let contents = fs::read_to_string(log_file(repo.path())).expect("log file written");
    assert!(contents.contains("compiling"));
}

#[test]
fn file_sink_is_off_by_default() {
    let repo = repo_with_workflow();
    ghaw(repo.path()).arg("validate").assert().success();
    assert!(!log_file(repo.path()).exists());
}

#[test]
fn ci_context_logs_to_stdout_without_file() {
    let repo = repo_with_workflow();
    write_logging_config(repo.path(), "[logging]\nenable_file = true\n");

    ghaw(repo.path())
        .env("CI", "true")
        .env("GHAW_LOG_LEVEL", "info")
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("compiling"));

    assert!(!log_file(repo.path()).exists());
}

#[test]
fn console_can_be_silenced_from_env() {
    let repo = repo_with_workflow();
    ghaw(repo.path())
        .env("GHAW_LOG_LEVEL", "debug")
        .env("GHAW_LOG_CONSOLE", "none")
        .arg("validate")
        .assert()
        .success()
        .stderr(predicate::str::contains("compiling").not())
        .stderr(predicate::str::contains("compiled 1 workflow(s)"));
}

#[test]
fn invalid_level_fails_before_compiling() {
    let repo = repo_with_workflow();
    ghaw(repo.path())
        .env("GHAW_LOG_LEVEL", "ghaw=loud")
        .arg("validate")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("valid tracing directive"));
}

#[test]
fn invalid_console_value_is_rejected() {
    let repo = repo_with_workflow();
    ghaw(repo.path())
        .env("GHAW_LOG_CONSOLE", "tty")
        .arg("validate")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("GHAW_LOG_CONSOLE"));
}
