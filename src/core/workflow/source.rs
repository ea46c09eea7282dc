#![allow(clippy::result_large_err)]

use crate::core::error::AppError;
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};

/// A parsed source document: front matter plus the Markdown prompt body.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub front_matter: Mapping,
    /// Raw front-matter text, kept for error locations
    pub front_matter_text: String,
    /// 1-based line of the first front-matter line in the file
    pub front_matter_line: usize,
    pub body: String,
}

impl SourceDocument {
    /// File stem without the `.md` extension, used as the default workflow name.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_else(|| "workflow".to_string())
    }

    pub fn dir(&self) -> PathBuf {
        self.path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Read and split a source file from disk.
pub fn read_source(path: &Path) -> Result<SourceDocument, AppError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        AppError::operation(format!("failed to read workflow {}", path.display()), e)
            .with_code("AW-OPS-010")
    })?;
    parse_source(&text, path)
}

/// Split `text` into front matter and body.
///
/// The front matter is the block between an opening `---` on the first line
/// and the next line that is exactly `---`. A document without that block has
/// an empty front matter and the whole text as its body.
pub fn parse_source(text: &str, path: &Path) -> Result<SourceDocument, AppError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let normalized = text.replace("\r\n", "\n");
    let mut lines = normalized.split_inclusive('\n');

    let first = lines.next().unwrap_or("");
    if first.trim_end() != "---" {
        return Ok(SourceDocument {
            path: path.to_path_buf(),
            front_matter: Mapping::new(),
            front_matter_text: String::new(),
            front_matter_line: 1,
            body: normalized,
        });
    }

    let mut front = String::new();
    let mut closed = false;
    for line in lines.by_ref() {
        if line.trim_end() == "---" {
            closed = true;
            break;
        }
        front.push_str(line);
    }
    if !closed {
        return Err(AppError::validation("front matter is not terminated by '---'")
            .with_code("AW-VAL-001")
            .with_location(format!("{}:1:1", path.display())));
    }
    let body: String = lines.collect();

    let front_matter = parse_front_matter(&front, path, 2)?;
    Ok(SourceDocument {
        path: path.to_path_buf(),
        front_matter,
        front_matter_text: front,
        front_matter_line: 2,
        body,
    })
}

/// Parse a front-matter block, reporting YAML errors at their file position.
pub fn parse_front_matter(text: &str, path: &Path, first_line: usize) -> Result<Mapping, AppError> {
    if text.trim().is_empty() {
        return Ok(Mapping::new());
    }
    let value: Value = serde_yaml::from_str(text).map_err(|e| {
        let (line, column) = e
            .location()
            .map(|loc| (loc.line() + first_line - 1, loc.column()))
            .unwrap_or((first_line, 1));
        AppError::validation(format!("invalid YAML in front matter: {}", strip_location(&e)))
            .with_code("AW-VAL-002")
            .with_location(format!("{}:{}:{}", path.display(), line, column))
    })?;
    match value {
        Value::Mapping(map) => Ok(map),
        Value::Null => Ok(Mapping::new()),
        other => Err(AppError::validation("front matter must be a YAML mapping")
            .with_code("AW-VAL-003")
            .with_value(format!("{:?}", other))
            .with_location(format!("{}:{}:1", path.display(), first_line))),
    }
}

fn strip_location(error: &serde_yaml::Error) -> String {
    let text = error.to_string();
    match text.find(" at line ") {
        Some(index) => text[..index].to_string(),
        None => text,
    }
}
