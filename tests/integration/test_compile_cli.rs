use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const DAILY: &str = "---\non: push\n---\n# Daily summary\n\nSummarize yesterday's activity.\n";
const BROKEN: &str = "---\non: push\nbogus: 1\n---\nBroken.\n";

fn workflows_dir(root: &Path) -> PathBuf {
    root.join(".github").join("workflows")
}

fn repo(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().expect("failed to create temp dir");
    let workflows = workflows_dir(dir.path());
    fs::create_dir_all(&workflows).unwrap();
    for (name, content) in files {
        fs::write(workflows.join(name), content).unwrap();
    }
    dir
}

fn ghaw(root: &Path) -> Command {
    let mut cmd = Command::cargo_bin("ghaw").expect("binary builds");
    cmd.current_dir(root)
        .env_remove("CI")
        .env_remove("GITHUB_ACTIONS")
        .env_remove("RUST_LOG")
        .env_remove("GHAW_LOG_LEVEL")
        .env_remove("GHAW_LOG_CONSOLE")
        .env_remove("GH_AW_ACTION_MODE")
        .env_remove("GH_AW_STRICT")
        .env_remove("GH_AW_FEATURES");
    cmd
}

#[test]
fn compile_writes_lock_and_helpers() {
    let repo = repo(&[("daily.md", DAILY)]);

    ghaw(repo.path())
        .arg("compile")
        .assert()
        .success()
        .stderr(predicate::str::contains("compiled 1 workflow(s): 0 error(s)"));

    let workflows = workflows_dir(repo.path());
    let lock = fs::read_to_string(workflows.join("daily.lock.yml")).expect("lock written");
    assert!(lock.starts_with("# This file was automatically generated by ghaw"));
    assert!(lock.contains("# Source: .github/workflows/daily.md"));
    assert!(workflows
        .join("aw")
        .join("daily")
        .join("check_workflow_timestamp.cjs")
        .is_file());
}

#[test]
fn recompile_is_byte_identical() {
    let repo = repo(&[("daily.md", DAILY)]);
    let lock_path = workflows_dir(repo.path()).join("daily.lock.yml");

    ghaw(repo.path()).arg("compile").assert().success();
    let first = fs::read_to_string(&lock_path).unwrap();
    ghaw(repo.path()).arg("compile").assert().success();
    let second = fs::read_to_string(&lock_path).unwrap();
    assert_eq!(first, second);
}

#[test]
fn no_emit_skips_helper_directory() {
    let repo = repo(&[("daily.md", DAILY)]);
    ghaw(repo.path())
        .args(["compile", "--no-emit"])
        .assert()
        .success();
    let workflows = workflows_dir(repo.path());
    assert!(workflows.join("daily.lock.yml").is_file());
    assert!(!workflows.join("aw").exists());
}

#[test]
fn validate_writes_nothing() {
    let repo = repo(&[("daily.md", DAILY)]);
    ghaw(repo.path())
        .arg("validate")
        .assert()
        .success()
        .stderr(predicate::str::contains("compiled 1 workflow(s)"));
    let workflows = workflows_dir(repo.path());
    assert!(!workflows.join("daily.lock.yml").exists());
    assert!(!workflows.join("aw").exists());
}

#[test]
fn failing_workflow_does_not_block_others() {
    let repo = repo(&[("broken.md", BROKEN), ("daily.md", DAILY)]);

    ghaw(repo.path())
        .arg("compile")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("[AW-SCH-002]"))
        .stderr(predicate::str::contains("unknown property 'bogus'"))
        .stderr(predicate::str::contains("compiled 1 workflow(s): 1 error(s)"));

    let workflows = workflows_dir(repo.path());
    assert!(workflows.join("daily.lock.yml").is_file());
    assert!(!workflows.join("broken.lock.yml").exists());
}

#[test]
fn explicit_file_compiles_only_that_file() {
    let repo = repo(&[("broken.md", BROKEN), ("daily.md", DAILY)]);
    ghaw(repo.path())
        .args(["compile", ".github/workflows/daily.md"])
        .assert()
        .success();
    assert!(workflows_dir(repo.path()).join("daily.lock.yml").is_file());
}

#[test]
fn dir_flag_selects_repository() {
    let repo = repo(&[("daily.md", DAILY)]);
    let elsewhere = TempDir::new().unwrap();
    ghaw(elsewhere.path())
        .arg("compile")
        .arg("--dir")
        .arg(repo.path())
        .assert()
        .success();
    assert!(workflows_dir(repo.path()).join("daily.lock.yml").is_file());
}

#[test]
fn dev_mode_checks_out_full_repository() {
    let repo = repo(&[("daily.md", DAILY)]);
    ghaw(repo.path())
        .args(["compile", "--action-mode", "dev"])
        .assert()
        .success();
    let lock = fs::read_to_string(workflows_dir(repo.path()).join("daily.lock.yml")).unwrap();
    assert!(!lock.contains("sparse-checkout"));

    ghaw(repo.path()).arg("compile").assert().success();
    let lock = fs::read_to_string(workflows_dir(repo.path()).join("daily.lock.yml")).unwrap();
    assert!(lock.contains("sparse-checkout"));
}

#[test]
fn missing_workflow_directory_is_a_setup_error() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join(".git")).unwrap();
    ghaw(dir.path())
        .arg("compile")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("no workflow directory"));
}

#[test]
fn verbose_prints_job_order() {
    let repo = repo(&[("daily.md", DAILY)]);
    ghaw(repo.path())
        .args(["compile", "--verbose"])
        .env("GHAW_LOG_CONSOLE", "none")
        .assert()
        .success()
        .stdout(predicate::str::contains("(activation, agent)"));
}
