#![allow(clippy::result_large_err)]

//! Materializes one source document from a tree of imported files.
//!
//! Front-matter `imports:` are merged (importer wins on scalars) and their
//! `steps:` collected ahead of the importer's own. Body directives are spliced
//! in place by [`include::expand_includes`].

pub mod include;
pub mod merge;

use crate::core::error::AppError;
use crate::core::workflow::source::{parse_front_matter, read_source, SourceDocument};
use crate::core::workflow::values::scalar_to_string;
use serde_yaml::{Mapping, Value};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub use include::{expand_includes, extract_section, parse_directive, IncludeDirective};
pub use merge::{merge_import, merge_under};

/// Front-matter keys whose contents flow from body includes into the importer.
const INCLUDE_MERGED_KEYS: &[&str] = &["tools", "mcp-servers", "network", "safe-outputs"];

#[derive(Debug, Default)]
struct Resolved {
    front_matter: Mapping,
    steps: Vec<Value>,
    body: String,
    imported_bodies: Vec<String>,
}

/// Walks the import graph depth-first in listed order.
///
/// Every visited file is recorded; a second visit is treated as already
/// resolved, so cycles terminate instead of failing.
#[derive(Debug, Default)]
pub struct ImportResolver {
    visited: HashSet<PathBuf>,
    copilot_setup_steps: Vec<Value>,
    imported_files: Vec<PathBuf>,
}

impl ImportResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Files merged into the last resolved document, in visit order.
    pub fn imported_files(&self) -> &[PathBuf] {
        &self.imported_files
    }

    /// Resolve imports and includes of `doc` into a single document.
    pub fn resolve(&mut self, doc: SourceDocument) -> Result<SourceDocument, AppError> {
        self.visited.insert(canonical(&doc.path));
        let resolved = self.resolve_document(&doc)?;

        let mut front_matter = resolved.front_matter;
        let mut steps = std::mem::take(&mut self.copilot_setup_steps);
        steps.extend(resolved.steps);
        if !steps.is_empty() {
            front_matter.insert(Value::from("steps"), Value::Sequence(steps));
        }

        let mut body = resolved.body;
        for imported in resolved.imported_bodies {
            if imported.trim().is_empty() {
                continue;
            }
            if !body.ends_with('\n') && !body.is_empty() {
                body.push('\n');
            }
            body.push('\n');
            body.push_str(&imported);
        }

        tracing::debug!(
            "resolved {} with {} imported file(s)",
            doc.path.display(),
            self.imported_files.len()
        );
        Ok(SourceDocument {
            front_matter,
            body,
            ..doc
        })
    }

    fn resolve_document(&mut self, doc: &SourceDocument) -> Result<Resolved, AppError> {
        let base_dir = doc.dir();
        let mut own = doc.front_matter.clone();
        let import_specs = own
            .remove("imports")
            .map(|value| import_list(&value, &doc.path))
            .transpose()?
            .unwrap_or_default();
        let own_steps = take_steps(&mut own);

        let mut imported = Mapping::new();
        let mut imported_steps = Vec::new();
        let mut imported_bodies = Vec::new();

        for spec in import_specs {
            let path = base_dir.join(&spec);
            if !path.is_file() {
                return Err(AppError::validation(format!("import file not found: {}", path.display()))
                    .with_code("AW-VAL-030")
                    .with_field("imports")
                    .with_value(&spec)
                    .with_location(doc.path.display().to_string()));
            }
            if !self.visited.insert(canonical(&path)) {
                tracing::debug!("import {} already resolved, skipping", path.display());
                continue;
            }
            self.imported_files.push(path.clone());

            if is_copilot_setup_file(&path) {
                let steps = load_copilot_setup_steps(&path)?;
                self.copilot_setup_steps.extend(steps);
                continue;
            }

            let sub = if is_yaml_file(&path) {
                let text = read_text(&path)?;
                let mut front_matter = parse_front_matter(&text, &path, 1)?;
                let steps = take_steps(&mut front_matter);
                Resolved {
                    front_matter,
                    steps,
                    ..Resolved::default()
                }
            } else {
                let sub_doc = read_source(&path)?;
                self.resolve_document(&sub_doc)?
            };

            merge::merge_import(&mut imported, &sub.front_matter, &spec)?;
            imported_steps.extend(sub.steps);
            imported_bodies.push(sub.body);
            imported_bodies.extend(sub.imported_bodies);
        }

        let mut stack = vec![canonical(&doc.path)];
        let expanded = include::expand_includes(&doc.body, &base_dir, &mut stack)?;
        for included in &expanded.front_matters {
            let mut relevant = Mapping::new();
            for key in INCLUDE_MERGED_KEYS {
                if let Some(value) = included.get(*key) {
                    relevant.insert(Value::from(*key), value.clone());
                }
            }
            merge::merge_import(&mut imported, &relevant, "@include")?;
        }

        merge::merge_under(&mut own, &imported);
        imported_steps.extend(own_steps);

        Ok(Resolved {
            front_matter: own,
            steps: imported_steps,
            body: expanded.text,
            imported_bodies,
        })
    }
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

fn read_text(path: &Path) -> Result<String, AppError> {
    std::fs::read_to_string(path)
        .map_err(|e| AppError::operation(format!("failed to read import {}", path.display()), e))
}

fn import_list(value: &Value, origin: &Path) -> Result<Vec<String>, AppError> {
    let items = match value {
        Value::Sequence(items) => items.clone(),
        Value::String(_) => vec![value.clone()],
        Value::Null => vec![],
        _ => {
            return Err(AppError::validation("imports must be a list of relative paths")
                .with_code("AW-VAL-031")
                .with_field("imports")
                .with_location(origin.display().to_string()))
        }
    };
    items
        .iter()
        .map(|item| match item {
            Value::Mapping(map) => map.get("path").and_then(scalar_to_string),
            other => scalar_to_string(other),
        })
        .map(|spec| {
            spec.ok_or_else(|| {
                AppError::validation("import entries must be strings")
                    .with_code("AW-VAL-031")
                    .with_field("imports")
            })
        })
        .collect()
}

fn take_steps(front_matter: &mut Mapping) -> Vec<Value> {
    match front_matter.remove("steps") {
        Some(Value::Sequence(steps)) => steps,
        Some(Value::Null) | None => vec![],
        Some(other) => vec![other],
    }
}

fn is_yaml_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yml") | Some("yaml")
    )
}

pub fn is_copilot_setup_file(path: &Path) -> bool {
    matches!(
        path.file_name().and_then(|name| name.to_str()),
        Some("copilot-setup-steps.yml") | Some("copilot-setup-steps.yaml")
    )
}

/// Steps of the `copilot-setup-steps` job, minus its checkout.
pub fn load_copilot_setup_steps(path: &Path) -> Result<Vec<Value>, AppError> {
    let text = read_text(path)?;
    let workflow = parse_front_matter(&text, path, 1)?;
    let jobs = workflow.get("jobs").and_then(Value::as_mapping);
    let job = jobs.and_then(|jobs| {
        jobs.get("copilot-setup-steps")
            .or_else(|| jobs.values().find(|job| job.get("steps").is_some()))
    });
    let Some(steps) = job.and_then(|job| job.get("steps")).and_then(Value::as_sequence) else {
        return Err(AppError::validation(format!(
            "{} does not define a job with steps",
            path.display()
        ))
        .with_code("AW-VAL-032"));
    };
    Ok(steps
        .iter()
        .filter(|step| {
            !step
                .get("uses")
                .and_then(Value::as_str)
                .is_some_and(|uses| uses.starts_with("actions/checkout"))
        })
        .cloned()
        .collect())
}
