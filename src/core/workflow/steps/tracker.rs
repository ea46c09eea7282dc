#![allow(clippy::result_large_err)]

use super::StepEntry;
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;

/// Roots the redaction step scans.
pub const SCANNABLE_ROOTS: &[&str] = &["/tmp/gh-aw/", "/opt/gh-aw/"];
const SCANNABLE_EXTENSIONS: &[&str] = &["json", "jsonl", "txt", "log"];
const SAFE_OUTPUTS_ENV_REF: &str = "${{ env.GH_AW_SAFE_OUTPUTS }}";

#[derive(Debug, Clone)]
struct UploadRecord {
    position: usize,
    name: String,
    paths: Vec<String>,
}

/// Watches the agent job's steps once the engine has run and checks that
/// nothing is uploaded before secrets are redacted.
#[derive(Debug, Default)]
pub struct StepOrderTracker {
    position: usize,
    after_execution: bool,
    redactions: Vec<(usize, String)>,
    uploads: Vec<UploadRecord>,
}

impl StepOrderTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_agent_execution_complete(&mut self) {
        self.after_execution = true;
    }

    pub fn record(&mut self, step: &StepEntry) {
        self.position += 1;
        if !self.after_execution {
            return;
        }
        let name = step.name().unwrap_or_default();
        if name.contains("Redact secrets") {
            self.redactions.push((self.position, name));
            return;
        }
        if step.uses().is_some_and(|uses| uses.starts_with("actions/upload-artifact")) {
            let paths = step
                .input("path")
                .map(|paths| {
                    paths
                        .lines()
                        .map(str::trim)
                        .filter(|line| !line.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            self.uploads.push(UploadRecord {
                position: self.position,
                name,
                paths,
            });
        }
    }

    /// Check the recorded order; violations are compiler bugs.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.uploads.is_empty() {
            return Ok(());
        }
        let Some((first_redaction, _)) = self.redactions.first() else {
            return Err(AppError::compiler_bug(format!(
                "agent job uploads artifacts ({}) but has no secret redaction step",
                self.uploads.iter().map(|u| u.name.as_str()).collect::<Vec<_>>().join(", ")
            ))
            .with_code("AW-BUG-001"));
        };

        let mut errors = Vec::new();
        for upload in &self.uploads {
            if upload.position < *first_redaction {
                errors.push(
                    AppError::compiler_bug(format!(
                        "upload step '{}' runs before secret redaction",
                        upload.name
                    ))
                    .with_code("AW-BUG-002"),
                );
            }
            for path in &upload.paths {
                if !is_path_scanned(path) {
                    errors.push(
                        AppError::compiler_bug(format!(
                            "upload step '{}' uploads '{}', which secret redaction does not scan",
                            upload.name, path
                        ))
                        .with_code("AW-BUG-003")
                        .with_value(path),
                    );
                }
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::batch(ErrorCategory::CompilerBug, errors))
        }
    }
}

/// Whether the redaction step covers an upload path.
pub fn is_path_scanned(path: &str) -> bool {
    if path == SAFE_OUTPUTS_ENV_REF {
        return true;
    }
    if path.contains("..") || !SCANNABLE_ROOTS.iter().any(|root| path.starts_with(root)) {
        return false;
    }
    if path.ends_with('/') {
        return true;
    }
    let file_name = path.rsplit('/').next().unwrap_or(path);
    match file_name.rsplit_once('.') {
        Some((_, extension)) => SCANNABLE_EXTENSIONS.contains(&extension),
        None => true,
    }
}
