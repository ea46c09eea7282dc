use ghaw::core::config::{ConfigLoader, GhawConfig};
use ghaw::core::types::ActionMode;
use ghaw::core::ConfigValidator;
use serial_test::serial;
use std::env;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_config(root: &Path, content: &str) {
    let path = ConfigLoader::config_path(root);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn clear_env() {
    env::remove_var("GH_AW_ACTION_MODE");
    env::remove_var("GH_AW_STRICT");
}

#[test]
#[serial]
fn test_defaults_without_config_file() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let config = ConfigLoader::load_from_workspace(dir.path()).unwrap();
    assert!(!config.compiler.strict);
    assert!(!config.compiler.refresh_stop_time);
    assert_eq!(config.compiler.action_mode, ActionMode::Release);
    assert!(config.compiler.emit_aux_files);
    assert_eq!(config.compiler.default_runs_on, "ubuntu-latest");
}

#[test]
#[serial]
fn test_file_values_are_applied() {
    clear_env();
    let dir = TempDir::new().unwrap();
    write_config(
        dir.path(),
        "[compiler]\naction_mode = \"dev\"\nemit_aux_files = false\ndefault_runs_on = \"self-hosted\"\n",
    );
    let config = ConfigLoader::load_from_workspace(dir.path()).unwrap();
    assert_eq!(config.compiler.action_mode, ActionMode::Dev);
    assert!(!config.compiler.emit_aux_files);
    assert_eq!(config.compiler.default_runs_on, "self-hosted");
}

#[test]
#[serial]
fn test_env_overrides_file() {
    clear_env();
    let dir = TempDir::new().unwrap();
    write_config(dir.path(), "[compiler]\naction_mode = \"dev\"\nstrict = false\n");
    env::set_var("GH_AW_ACTION_MODE", "release");
    env::set_var("GH_AW_STRICT", "true");
    let config = ConfigLoader::load_from_workspace(dir.path()).unwrap();
    clear_env();
    assert_eq!(config.compiler.action_mode, ActionMode::Release);
    assert!(config.compiler.strict);
}

#[test]
#[serial]
fn test_invalid_env_action_mode_is_ignored() {
    clear_env();
    let dir = TempDir::new().unwrap();
    env::set_var("GH_AW_ACTION_MODE", "staging");
    let config = ConfigLoader::load_from_workspace(dir.path()).unwrap();
    clear_env();
    assert_eq!(config.compiler.action_mode, ActionMode::Release);
}

#[test]
#[serial]
fn test_empty_runner_fails_validation() {
    clear_env();
    let dir = TempDir::new().unwrap();
    write_config(dir.path(), "[compiler]\ndefault_runs_on = \"\"\n");
    let err = ConfigLoader::load_from_workspace(dir.path()).unwrap_err();
    assert_eq!(err.code, "AW-CFG-002");
}

#[test]
fn test_action_mode_parsing() {
    assert_eq!("dev".parse::<ActionMode>(), Ok(ActionMode::Dev));
    assert_eq!(" Release ".parse::<ActionMode>(), Ok(ActionMode::Release));
    assert!("prod".parse::<ActionMode>().is_err());
    assert_eq!(ActionMode::Dev.to_string(), "dev");
}

#[test]
fn test_default_config_validates() {
    assert!(ConfigValidator::validate(&GhawConfig::default()).is_ok());
}

#[test]
fn test_env_var_documentation_lists_overrides() {
    let docs = ConfigLoader::env_var_documentation();
    assert!(docs.iter().any(|line| line.starts_with("GH_AW_ACTION_MODE")));
    assert!(docs.iter().any(|line| line.starts_with("GH_AW_STRICT")));
}
