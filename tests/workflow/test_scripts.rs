use ghaw::core::workflow::scripts::{
    find_javascript_dependencies, github_script_body, RuntimeMode, ScriptRegistry,
};
use std::collections::BTreeMap;

fn names(registry: &ScriptRegistry, roots: &[&str]) -> Vec<String> {
    registry
        .bundle(roots.iter().copied())
        .unwrap()
        .into_iter()
        .map(|record| record.name.clone())
        .collect()
}

#[test]
fn test_embedded_helpers_pass_guards() {
    let registry = ScriptRegistry::with_embedded().unwrap();
    assert_eq!(registry.len(), 30);
    assert_eq!(registry.get("check_stop_time").unwrap().mode, RuntimeMode::GitHubScript);
    assert_eq!(registry.get("mcp_server_core").unwrap().mode, RuntimeMode::NodeJs);
    assert_eq!(registry.get("create_issue").unwrap().file_name(), "create_issue.cjs");
}

#[test]
fn test_bundle_pulls_in_required_helpers() {
    let registry = ScriptRegistry::with_embedded().unwrap();
    assert_eq!(
        names(&registry, &["add_comment"]),
        vec!["add_comment", "load_agent_output", "resolve_target", "staged_preview"]
    );
    assert_eq!(
        names(&registry, &["safe_outputs_mcp_server", "missing_tool"]),
        vec![
            "load_agent_output",
            "mcp_server_core",
            "missing_tool",
            "safe_outputs_append",
            "safe_outputs_config",
            "safe_outputs_mcp_server",
        ]
    );
}

#[test]
fn test_bundle_rejects_unknown_helper() {
    let registry = ScriptRegistry::with_embedded().unwrap();
    let err = registry.bundle(["launch_rockets"]).unwrap_err();
    assert_eq!(err.code, "AW-BUG-031");
}

#[test]
fn test_registering_unsafe_helper_fails() {
    let mut registry = ScriptRegistry::new();
    let err = registry
        .register_with_mode(
            "shell_out",
            "const { execSync } = require('child_process');\nexecSync('ls');\n",
            RuntimeMode::GitHubScript,
        )
        .unwrap_err();
    assert_eq!(err.code, "AW-BUG-030");
    assert!(registry.is_empty());

    let err = registry
        .register_with_mode("server", "core.info('hi');\n", RuntimeMode::NodeJs)
        .unwrap_err();
    assert_eq!(err.code, "AW-BUG-030");
}

#[test]
fn test_dependency_walk_handles_nesting_and_cycles() {
    let mut sources = BTreeMap::new();
    sources.insert("js/lib/a.cjs".to_string(), "require('../b.cjs');\n".to_string());
    sources.insert("js/b.cjs".to_string(), "require(\"./lib/a.cjs\");\n".to_string());
    let found = find_javascript_dependencies("const a = require('./lib/a.cjs');", &sources, "js").unwrap();
    assert_eq!(
        found.into_iter().collect::<Vec<_>>(),
        vec!["js/b.cjs".to_string(), "js/lib/a.cjs".to_string()]
    );

    let err = find_javascript_dependencies("require('./gone.cjs')", &sources, "js").unwrap_err();
    assert_eq!(err.code, "AW-BUG-032");
    assert!(err.message.contains("js/gone.cjs"));
}

#[test]
fn test_github_script_body_loads_helper() {
    let body = github_script_body(".github/workflows/aw/daily/", "add_comment");
    assert!(body.contains("require('./.github/workflows/aw/daily/add_comment.cjs')"));
    assert!(body.ends_with("await main();\n"));
}
