use std::process::Command;

fn help(args: &[&str]) -> String {
    let output = Command::new(assert_cmd::cargo::cargo_bin!("ghaw"))
        .args(args)
        .output()
        .expect("should run successfully");
    assert!(output.status.success());
    String::from_utf8(output.stdout).unwrap()
}

#[test]
fn test_top_level_help_lists_commands() {
    let stdout = help(&["--help"]);
    assert!(stdout.contains("COMMANDS:"));
    assert!(stdout.contains("compile"));
    assert!(stdout.contains("validate"));
    assert!(stdout.contains("Typical flow"));
}

#[test]
fn test_compile_help_lists_flags() {
    let stdout = help(&["compile", "--help"]);
    for flag in [
        "--dir",
        "--strict",
        "--refresh-stop-time",
        "--action-mode",
        "--no-emit",
        "--verbose",
    ] {
        assert!(stdout.contains(flag), "missing {} in:\n{}", flag, stdout);
    }
    assert!(stdout.contains("ghaw compile .github/workflows/triage.md --strict"));
}

#[test]
fn test_validate_help_explains_no_writes() {
    let stdout = help(&["validate", "--help"]);
    assert!(stdout.contains("leaves lock files and helper files untouched"));
}

#[test]
fn test_version_flag() {
    let stdout = help(&["--version"]);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_invalid_action_mode_is_a_usage_error() {
    let output = Command::new(assert_cmd::cargo::cargo_bin!("ghaw"))
        .args(["compile", "--action-mode", "staging"])
        .output()
        .expect("should run");
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("supported values are dev, release"));
}
