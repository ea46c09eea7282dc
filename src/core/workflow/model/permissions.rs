use crate::core::error::AppError;
use crate::core::workflow::values::{scalar_to_string, type_name};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Scopes GitHub Actions accepts under `permissions:`.
pub const PERMISSION_SCOPES: &[&str] = &[
    "actions",
    "attestations",
    "checks",
    "contents",
    "deployments",
    "discussions",
    "id-token",
    "issues",
    "metadata",
    "models",
    "packages",
    "pages",
    "pull-requests",
    "repository-projects",
    "security-events",
    "statuses",
];

/// Scopes that cannot be granted `read`, so `all: read` skips them.
const WRITE_ONLY_SCOPES: &[&str] = &["id-token"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PermissionLevel {
    None,
    Read,
    Write,
}

impl PermissionLevel {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "read" => Some(PermissionLevel::Read),
            "write" => Some(PermissionLevel::Write),
            "none" => Some(PermissionLevel::None),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionLevel::None => "none",
            PermissionLevel::Read => "read",
            PermissionLevel::Write => "write",
        }
    }

    /// Whether holding `self` grants what `required` asks for.
    pub fn satisfies(&self, required: PermissionLevel) -> bool {
        *self >= required
    }
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed `permissions:` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionSet {
    ReadAll,
    WriteAll,
    NoneAll,
    /// Per-scope map; `all_read` records an `all: read` entry.
    Scoped {
        all_read: bool,
        scopes: BTreeMap<String, PermissionLevel>,
    },
}

impl Default for PermissionSet {
    fn default() -> Self {
        PermissionSet::empty()
    }
}

impl PermissionSet {
    pub fn empty() -> Self {
        PermissionSet::Scoped {
            all_read: false,
            scopes: BTreeMap::new(),
        }
    }

    pub fn from_pairs(pairs: &[(&str, PermissionLevel)]) -> Self {
        PermissionSet::Scoped {
            all_read: false,
            scopes: pairs.iter().map(|(scope, level)| (scope.to_string(), *level)).collect(),
        }
    }

    /// Parse the shorthand set first, then `all: read`, then a per-scope map.
    pub fn parse(value: &Value) -> Result<Self, AppError> {
        match value {
            Value::Null => Ok(PermissionSet::empty()),
            Value::String(shorthand) => match shorthand.trim() {
                "read-all" => Ok(PermissionSet::ReadAll),
                "write-all" => Ok(PermissionSet::WriteAll),
                "none" => Ok(PermissionSet::NoneAll),
                "" => Ok(PermissionSet::empty()),
                other => Err(AppError::validation(format!(
                    "invalid permissions shorthand '{}'; must be one of: read-all, write-all, none",
                    other
                ))
                .with_code("AW-VAL-080")
                .with_field("permissions")
                .with_value(other)),
            },
            Value::Mapping(map) => Self::parse_map(map),
            other => Err(AppError::validation(format!(
                "permissions must be a string or a map, got {}",
                type_name(other)
            ))
            .with_code("AW-VAL-080")
            .with_field("permissions")),
        }
    }

    fn parse_map(map: &Mapping) -> Result<Self, AppError> {
        let mut all_read = false;
        let mut scopes = BTreeMap::new();
        for (key, value) in map {
            let scope = scalar_to_string(key).unwrap_or_default();
            let raw = scalar_to_string(value).unwrap_or_default();
            let field = format!("permissions.{}", scope);
            let Some(level) = PermissionLevel::parse(&raw) else {
                return Err(AppError::validation(format!(
                    "invalid permission level '{}' for '{}'; must be one of: read, write, none",
                    raw, scope
                ))
                .with_code("AW-VAL-081")
                .with_field(field)
                .with_value(&raw));
            };
            if scope == "all" {
                if level != PermissionLevel::Read {
                    return Err(AppError::validation("'all' only accepts 'read'")
                        .with_code("AW-VAL-082")
                        .with_field(field)
                        .with_value(&raw)
                        .with_suggestion("grant write access per scope instead of using all: write"));
                }
                all_read = true;
                continue;
            }
            if !PERMISSION_SCOPES.contains(&scope.as_str()) {
                return Err(AppError::validation(format!("unknown permission scope '{}'", scope))
                    .with_code("AW-VAL-083")
                    .with_field(field)
                    .with_suggestion(format!("valid scopes: {}", PERMISSION_SCOPES.join(", "))));
            }
            scopes.insert(scope, level);
        }
        if all_read && scopes.values().any(|level| *level == PermissionLevel::None) {
            return Err(AppError::validation("'all: read' cannot be combined with scopes set to 'none'")
                .with_code("AW-VAL-084")
                .with_field("permissions"));
        }
        Ok(PermissionSet::Scoped { all_read, scopes })
    }

    /// Effective level granted for one scope.
    pub fn level(&self, scope: &str) -> PermissionLevel {
        match self {
            PermissionSet::ReadAll => PermissionLevel::Read,
            PermissionSet::WriteAll => PermissionLevel::Write,
            PermissionSet::NoneAll => PermissionLevel::None,
            PermissionSet::Scoped { all_read, scopes } => match scopes.get(scope) {
                Some(level) => *level,
                None if *all_read && !WRITE_ONLY_SCOPES.contains(&scope) => PermissionLevel::Read,
                None => PermissionLevel::None,
            },
        }
    }

    /// Raise a scope to at least `level`.
    pub fn grant(&mut self, scope: &str, level: PermissionLevel) {
        if self.level(scope).satisfies(level) {
            return;
        }
        let expanded = self.expanded();
        *self = PermissionSet::Scoped {
            all_read: false,
            scopes: expanded,
        };
        if let PermissionSet::Scoped { scopes, .. } = self {
            scopes.insert(scope.to_string(), level);
        }
    }

    fn expanded(&self) -> BTreeMap<String, PermissionLevel> {
        match self {
            PermissionSet::Scoped {
                all_read: false,
                scopes,
            } => scopes.clone(),
            _ => PERMISSION_SCOPES
                .iter()
                .filter(|scope| self.level(scope) != PermissionLevel::None)
                .map(|scope| (scope.to_string(), self.level(scope)))
                .collect(),
        }
    }

    /// Job-level `permissions:` lines, already indented by `indent` spaces.
    ///
    /// `all: read` is not valid workflow syntax, so it expands into every scope.
    pub fn render(&self, indent: usize) -> Vec<String> {
        let pad = " ".repeat(indent);
        match self {
            PermissionSet::ReadAll => vec![format!("{}permissions: read-all", pad)],
            PermissionSet::WriteAll => vec![format!("{}permissions: write-all", pad)],
            PermissionSet::NoneAll => vec![format!("{}permissions: {{}}", pad)],
            PermissionSet::Scoped { .. } => {
                let scopes = self.expanded();
                if scopes.is_empty() {
                    return vec![format!("{}permissions: {{}}", pad)];
                }
                let mut lines = vec![format!("{}permissions:", pad)];
                for (scope, level) in scopes {
                    lines.push(format!("{}  {}: {}", pad, scope, level));
                }
                lines
            }
        }
    }
}
