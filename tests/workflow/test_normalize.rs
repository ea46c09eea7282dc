use ghaw::core::context::CompilerContext;
use ghaw::core::workflow::normalize::{
    apply_default_pipeline, expand_bash_tools, expand_toolsets, DEFAULT_BASH_COMMANDS, GIT_BASH_COMMANDS,
};
use serde_yaml::{Mapping, Value};

fn normalize(text: &str) -> Mapping {
    let front_matter: Mapping = serde_yaml::from_str(text).unwrap();
    apply_default_pipeline(front_matter, &CompilerContext::new()).unwrap()
}

fn strings(value: &Value) -> Vec<String> {
    serde_yaml::from_value(value.clone()).unwrap()
}

#[test]
fn test_shorthands_are_expanded() {
    let fm = normalize("engine: claude\nconcurrency: deploy\nnetwork: defaults\n");
    assert_eq!(fm["engine"]["id"], Value::from("claude"));
    assert_eq!(fm["concurrency"]["group"], Value::from("deploy"));
    assert_eq!(strings(&fm["network"]["allowed"]), vec!["defaults"]);
}

#[test]
fn test_numeric_reaction_is_canonical() {
    let fm = normalize("on:\n  issues:\n    types: [opened]\n  reaction: 1\n");
    assert_eq!(fm["on"]["reaction"], Value::from("+1"));
    let fm = normalize("on:\n  issues:\n    types: [opened]\n  reaction: -1\n");
    assert_eq!(fm["on"]["reaction"], Value::from("-1"));
}

#[test]
fn test_invalid_reaction_fails() {
    let front_matter: Mapping = serde_yaml::from_str("on:\n  reaction: thumbs\n").unwrap();
    let err = apply_default_pipeline(front_matter, &CompilerContext::new()).unwrap_err();
    assert_eq!(err.code, "AW-VAL-040");
    assert_eq!(err.field.as_deref(), Some("on.reaction"));
}

#[test]
fn test_fractional_timeout_truncates_with_warning() {
    let ctx = CompilerContext::new();
    let front_matter: Mapping = serde_yaml::from_str("timeout-minutes: 12.7\n").unwrap();
    let fm = apply_default_pipeline(front_matter, &ctx).unwrap();
    assert_eq!(fm["timeout-minutes"], Value::from(12));
    assert_eq!(ctx.warning_count(), 1);
}

#[test]
fn test_toolset_aliases_expand() {
    let fm = normalize("tools:\n  github:\n    toolset: [default, actions]\n");
    let github = &fm["tools"]["github"];
    assert!(github.get("toolset").is_none());
    assert_eq!(
        strings(&github["toolsets"]),
        vec!["context", "repos", "issues", "pull_requests", "actions"]
    );
    assert_eq!(
        expand_toolsets(&["repos".to_string(), "action-friendly".to_string()]),
        vec!["repos", "context", "issues", "pull_requests"]
    );
}

#[test]
fn test_bash_allow_list_forms() {
    let defaults: Vec<String> = DEFAULT_BASH_COMMANDS.iter().map(|c| c.to_string()).collect();

    assert!(expand_bash_tools(Some(&Value::Bool(false)), false).is_none());
    assert_eq!(strings(&expand_bash_tools(Some(&Value::Bool(true)), false).unwrap()), vec!["*"]);
    assert_eq!(strings(&expand_bash_tools(Some(&Value::Null), false).unwrap()), defaults);

    let wildcard: Value = serde_yaml::from_str("[make, \":*\"]").unwrap();
    assert_eq!(strings(&expand_bash_tools(Some(&wildcard), false).unwrap()), vec!["*"]);

    let empty = Value::Sequence(vec![]);
    assert!(strings(&expand_bash_tools(Some(&empty), true).unwrap()).is_empty());

    let custom: Value = serde_yaml::from_str("[make, echo]").unwrap();
    let mut expected = defaults.clone();
    expected.push("make".to_string());
    assert_eq!(strings(&expand_bash_tools(Some(&custom), false).unwrap()), expected);
}

#[test]
fn test_git_safe_outputs_add_git_commands() {
    let fm = normalize("tools:\n  edit:\nsafe-outputs:\n  create-pull-request:\n");
    let bash = strings(&fm["tools"]["bash"]);
    for command in GIT_BASH_COMMANDS {
        assert!(bash.contains(&command.to_string()), "missing {}", command);
    }
    assert!(bash.contains(&"echo".to_string()));
}

#[test]
fn test_disabled_bash_is_removed() {
    let fm = normalize("tools:\n  bash: false\n");
    assert!(fm["tools"].get("bash").is_none());
}

#[test]
fn test_cache_memory_entries_get_ids() {
    let fm = normalize("tools:\n  cache-memory: true\n");
    let caches = fm["tools"]["cache-memory"].as_sequence().unwrap();
    assert_eq!(caches.len(), 1);
    assert_eq!(caches[0]["id"], Value::from("default"));

    let front_matter: Mapping =
        serde_yaml::from_str("tools:\n  cache-memory:\n    - id: a\n    - id: a\n").unwrap();
    let err = apply_default_pipeline(front_matter, &CompilerContext::new()).unwrap_err();
    assert_eq!(err.code, "AW-VAL-051");
}

#[test]
fn test_unknown_shapes_are_left_for_schema() {
    let fm = normalize("engine: 7\nnetwork: [a, b]\n");
    assert_eq!(fm["engine"], Value::from(7));
    assert!(fm["network"].is_sequence());
}
