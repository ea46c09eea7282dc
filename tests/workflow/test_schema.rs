use ghaw::core::context::CompilerContext;
use ghaw::core::workflow::schema::locator::locate;
use ghaw::core::workflow::schema::{warn_unknown_nested_keys, FrontMatterSchemaValidator, SchemaErrorKind};
use serde_yaml::Mapping;
use std::path::Path;

fn map(text: &str) -> Mapping {
    serde_yaml::from_str(text).unwrap()
}

#[test]
fn test_type_mismatch_reports_actual_type() {
    let validator = FrontMatterSchemaValidator::new().unwrap();
    let text = "name: demo\ntimeout-minutes: soon\n";
    let err = validator
        .validate(&map(text), Path::new("wf.md"), text, 2)
        .unwrap_err();
    assert_eq!(err.code, "AW-SCH-003");
    assert_eq!(err.field.as_deref(), Some("/timeout-minutes"));
    assert_eq!(err.location.as_deref(), Some("wf.md:3:1"));
    assert!(err.message.contains("got string"), "{}", err.message);
}

#[test]
fn test_engine_id_outside_enum() {
    let validator = FrontMatterSchemaValidator::new().unwrap();
    let violations = validator.violations(&map("engine:\n  id: gpt\n"));
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].kind, SchemaErrorKind::InvalidEnum);
    assert_eq!(violations[0].path, "/engine/id");
}

#[test]
fn test_every_violation_is_reported() {
    let validator = FrontMatterSchemaValidator::new().unwrap();
    let text = "bogus: 1\nstrict: maybe\n";
    let err = validator
        .validate(&map(text), Path::new("wf.md"), text, 2)
        .unwrap_err();
    assert_eq!(err.count(), 2);
    let codes: Vec<&str> = err.leaves().iter().map(|leaf| leaf.code.as_str()).collect();
    assert!(codes.contains(&"AW-SCH-002"));
    assert!(codes.contains(&"AW-SCH-003"));
}

#[test]
fn test_empty_front_matter_is_valid() {
    let validator = FrontMatterSchemaValidator::new().unwrap();
    assert!(validator.violations(&Mapping::new()).is_empty());
}

#[test]
fn test_locator_follows_nested_keys() {
    let text = "on:\n  issues:\n    types: [opened]\ntools:\n  bash:\n    - echo\n    - ls\n";
    assert_eq!(locate(text, "/on/issues/types"), Some((3, 5)));
    assert_eq!(locate(text, "/tools/bash/1"), Some((7, 5)));
    assert_eq!(locate(text, "/missing"), Some((1, 1)));
}

#[test]
fn test_unknown_open_map_keys_warn() {
    let ctx = CompilerContext::new();
    warn_unknown_nested_keys(
        &map("on:\n  issues:\n  not-an-event:\n  reaction: eyes\nnetwork:\n  allowed: [defaults]\n  proxy: x\n"),
        &ctx,
    );
    assert_eq!(ctx.warning_count(), 2);
    let messages = ctx.warning_messages();
    assert!(messages.iter().any(|m| m.contains("not-an-event")));
    assert!(messages.iter().any(|m| m.contains("'proxy' in 'network'")));
}
