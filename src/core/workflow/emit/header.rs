use crate::core::workflow::values::to_json;
use serde_yaml::{Mapping, Value};
use sha2::{Digest, Sha256};

/// Banner written above the workflow body.
#[derive(Debug, Clone, PartialEq)]
pub struct LockHeader {
    pub source: String,
    pub version: String,
    pub frontmatter_hash: String,
    pub description: Option<String>,
    /// `(from, to)` job dependency edges
    pub edges: Vec<(String, String)>,
    pub jobs: Vec<String>,
}

/// SHA-256 of the merged front matter serialized as JSON.
pub fn frontmatter_hash(front_matter: &Mapping) -> String {
    let json = to_json(&Value::Mapping(front_matter.clone()));
    let mut hasher = Sha256::new();
    hasher.update(json.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

pub fn render_header(header: &LockHeader) -> Vec<String> {
    let mut lines = vec![
        format!(
            "# This file was automatically generated by ghaw ({}). DO NOT EDIT.",
            header.version
        ),
        "#".to_string(),
        "# To update this file, edit the source workflow and run:".to_string(),
        "#   ghaw compile".to_string(),
        "#".to_string(),
        format!("# Source: {}", header.source),
        format!("# frontmatter-hash: {}", header.frontmatter_hash),
    ];
    if let Some(description) = &header.description {
        lines.push("#".to_string());
        for line in description.lines() {
            lines.push(format!("# {}", line).trim_end().to_string());
        }
    }
    lines.push("#".to_string());
    lines.push("# Job Dependency Graph:".to_string());
    lines.push("# ```mermaid".to_string());
    lines.push("# graph LR".to_string());
    for job in &header.jobs {
        lines.push(format!("#   {}[\"{}\"]", job, job));
    }
    for (from, to) in &header.edges {
        lines.push(format!("#   {} --> {}", from, to));
    }
    lines.push("# ```".to_string());
    lines.push(String::new());
    lines
}
