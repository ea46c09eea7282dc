#![allow(clippy::result_large_err)]

//! Commit SHAs for the actions the compiler emits or rewrites.

use crate::core::context::CompilerContext;
use crate::core::error::AppError;
use regex::Regex;
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::sync::LazyLock;

const PINS_JSON: &str = include_str!("../data/action_pins.json");

static PINS: LazyLock<Result<BTreeMap<String, String>, String>> =
    LazyLock::new(|| serde_json::from_str(PINS_JSON).map_err(|e| e.to_string()));

static SHA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9a-f]{40}$").expect("sha regex is valid"));

fn pins() -> Result<&'static BTreeMap<String, String>, AppError> {
    PINS.as_ref().map_err(|e| {
        AppError::compiler_bug(format!("embedded action pin table is invalid: {}", e)).with_code("AW-BUG-011")
    })
}

pub fn is_commit_sha(value: &str) -> bool {
    SHA.is_match(value)
}

/// Pinned SHA for `repo@version`, if known.
pub fn lookup(repo: &str, version: &str) -> Result<Option<String>, AppError> {
    Ok(pins()?.get(&format!("{}@{}", repo, version)).cloned())
}

/// `uses:` value for an action the compiler emits: `repo@<sha> # version`.
pub fn pinned(repo: &str, version: &str) -> Result<String, AppError> {
    match lookup(repo, version)? {
        Some(sha) => Ok(format!("{}@{} # {}", repo, sha, version)),
        None => Err(AppError::compiler_bug(format!("no pinned commit for {}@{}", repo, version))
            .with_code("AW-BUG-012")
            .with_suggestion("add the action to the embedded pin table")),
    }
}

/// Rewrite a user step's `uses:` to its pinned form.
///
/// Local actions, `docker://` images and refs that already name a commit are
/// left alone. Unknown refs warn, or fail in strict mode.
pub fn pin_user_step(step: &mut Value, strict: bool, context: &CompilerContext) -> Result<(), AppError> {
    let Some(uses) = step.get("uses").and_then(Value::as_str).map(str::to_string) else {
        return Ok(());
    };
    if uses.starts_with("./") || uses.starts_with("docker://") {
        return Ok(());
    }
    let Some((repo, version)) = uses.split_once('@') else {
        return unpinned(&uses, strict, context);
    };
    let version = version.split('#').next().unwrap_or(version).trim();
    if is_commit_sha(version) {
        return Ok(());
    }
    match lookup(repo, version)? {
        Some(sha) => {
            if let Value::Mapping(map) = step {
                map.insert(
                    Value::from("uses"),
                    Value::from(format!("{}@{} # {}", repo, sha, version)),
                );
            }
            Ok(())
        }
        None => unpinned(&uses, strict, context),
    }
}

fn unpinned(uses: &str, strict: bool, context: &CompilerContext) -> Result<(), AppError> {
    let message = format!("action '{}' is not pinned to a commit SHA", uses);
    if strict {
        return Err(AppError::validation(message)
            .with_code("AW-VAL-130")
            .with_field("steps")
            .with_value(uses)
            .with_suggestion("reference the action by a full 40-character commit SHA"));
    }
    context.warn(message);
    Ok(())
}
