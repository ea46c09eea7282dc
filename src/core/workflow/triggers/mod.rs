#![allow(clippy::result_large_err)]

//! Compiles the user's `on:` value into the emitted trigger block plus the
//! extra conditions the activation job must AND into its `if:`.

pub mod shorthand;

use crate::core::error::AppError;
use crate::core::workflow::values::{as_str, scalar_to_string, string_list};
use serde_yaml::{Mapping, Value};

pub use shorthand::{is_known_event, parse_trigger_shorthand, TriggerIR, TriggerParseError, KNOWN_EVENTS};

impl From<TriggerParseError> for AppError {
    fn from(error: TriggerParseError) -> Self {
        AppError::validation(error.to_string())
            .with_code("AW-VAL-070")
            .with_field("on")
            .with_suggestion("use a GitHub event name, a structured 'on:' map, or a supported shorthand")
    }
}

/// Trigger configuration after lowering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriggerSet {
    /// The `on:` value written to the lock file
    pub on: Value,
    /// Event names present in `on`, in order
    pub events: Vec<String>,
    pub conditions: Vec<String>,
    pub reaction: Option<String>,
    pub manual_approval: Option<String>,
    pub stop_after: Option<String>,
}

impl TriggerSet {
    pub fn has_event(&self, name: &str) -> bool {
        self.events.iter().any(|event| event == name)
    }

    /// Whether the triggering event carries an issue, PR or discussion to react to.
    pub fn has_reactable_event(&self) -> bool {
        const REACTABLE: &[&str] = &[
            "issues",
            "issue_comment",
            "pull_request",
            "pull_request_target",
            "pull_request_review_comment",
            "discussion",
            "discussion_comment",
        ];
        self.events.iter().any(|event| REACTABLE.contains(&event.as_str()))
    }

    /// Whether the run can start from a pull request or a comment on one.
    pub fn has_pull_request_event(&self) -> bool {
        const PULL_REQUEST: &[&str] = &[
            "pull_request",
            "pull_request_target",
            "pull_request_review",
            "pull_request_review_comment",
            "issue_comment",
        ];
        self.events.iter().any(|event| PULL_REQUEST.contains(&event.as_str()))
    }
}

/// Lower the `on:` value of the front matter.
pub fn lower_triggers(on: Option<&Value>) -> Result<TriggerSet, AppError> {
    let Some(on) = on else {
        return Err(AppError::validation("workflow must declare an 'on' trigger")
            .with_code("AW-VAL-071")
            .with_field("on"));
    };

    match on {
        Value::String(text) => match parse_trigger_shorthand(text)? {
            None => Ok(TriggerSet {
                on: Value::from(text.trim()),
                events: vec![text.trim().to_string()],
                ..TriggerSet::default()
            }),
            Some(ir) => Ok(TriggerSet {
                on: Value::Mapping(ir.to_yaml_map()),
                events: vec![ir.event.clone()],
                conditions: ir.conditions,
                ..TriggerSet::default()
            }),
        },
        Value::Sequence(items) => {
            let events = string_list(on).unwrap_or_default();
            if events.len() != items.len() {
                return Err(AppError::validation("trigger lists may only contain event names")
                    .with_code("AW-VAL-072")
                    .with_field("on"));
            }
            Ok(TriggerSet {
                on: on.clone(),
                events,
                ..TriggerSet::default()
            })
        }
        Value::Mapping(map) => lower_trigger_map(map),
        _ => Err(AppError::validation("'on' must be a string, list or map")
            .with_code("AW-VAL-072")
            .with_field("on")),
    }
}

fn lower_trigger_map(map: &Mapping) -> Result<TriggerSet, AppError> {
    let mut set = TriggerSet::default();
    let mut emitted = Mapping::new();

    for (key, value) in map {
        let name = scalar_to_string(key).unwrap_or_default();
        // reaction, manual-approval and stop-after configure the compiler, not GitHub
        match name.as_str() {
            "reaction" => set.reaction = scalar_to_string(value).filter(|r| r != "none"),
            "manual-approval" => set.manual_approval = as_str(value).map(str::to_string),
            "stop-after" => set.stop_after = scalar_to_string(value),
            "workflow_dispatch" => {
                validate_dispatch_inputs(value)?;
                set.events.push(name.clone());
                emitted.insert(key.clone(), empty_if_null(value));
            }
            _ => {
                set.events.push(name.clone());
                emitted.insert(key.clone(), empty_if_null(value));
            }
        }
    }

    if emitted.is_empty() {
        return Err(AppError::validation("'on' does not declare any event")
            .with_code("AW-VAL-073")
            .with_field("on"));
    }
    set.on = Value::Mapping(emitted);
    Ok(set)
}

fn empty_if_null(value: &Value) -> Value {
    match value {
        Value::Null => Value::Mapping(Mapping::new()),
        other => other.clone(),
    }
}

/// `choice` inputs need options, and a default must be one of them.
fn validate_dispatch_inputs(dispatch: &Value) -> Result<(), AppError> {
    let Some(inputs) = dispatch.get("inputs").and_then(Value::as_mapping) else {
        return Ok(());
    };
    for (name, input) in inputs {
        let name = scalar_to_string(name).unwrap_or_default();
        if input.get("type").and_then(Value::as_str) != Some("choice") {
            continue;
        }
        let options = input.get("options").and_then(string_list).unwrap_or_default();
        if options.is_empty() {
            return Err(AppError::validation(format!("choice input '{}' must define options", name))
                .with_code("AW-VAL-074")
                .with_field(format!("on.workflow_dispatch.inputs.{}.options", name)));
        }
        if let Some(default) = input.get("default").and_then(scalar_to_string) {
            if !options.contains(&default) {
                return Err(AppError::validation(format!(
                    "default '{}' of choice input '{}' is not one of its options",
                    default, name
                ))
                .with_code("AW-VAL-075")
                .with_field(format!("on.workflow_dispatch.inputs.{}.default", name)));
            }
        }
    }
    Ok(())
}
