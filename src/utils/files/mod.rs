#![allow(clippy::result_large_err)]

//! Atomic file writes and the per-workflow auxiliary directory.

use crate::core::error::AppError;
use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Write `content` through a temp file in the target directory, then rename
/// it into place. Returns `false` when the file already held `content`.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<bool, AppError> {
    if fs::read(path).is_ok_and(|existing| existing == content) {
        return Ok(false);
    }
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    fs::create_dir_all(parent).map_err(|e| {
        AppError::operation(format!("failed to create directory {}", parent.display()), e).with_code("AW-OPS-060")
    })?;
    let mut file = NamedTempFile::new_in(parent).map_err(|e| {
        AppError::operation(format!("failed to create temp file in {}", parent.display()), e).with_code("AW-OPS-061")
    })?;
    file.write_all(content)
        .and_then(|_| file.flush())
        .map_err(|e| AppError::operation(format!("failed to write {}", path.display()), e).with_code("AW-OPS-062"))?;
    file.persist(path).map_err(|e| {
        AppError::operation(format!("failed to move output into {}", path.display()), e.error).with_code("AW-OPS-063")
    })?;
    Ok(true)
}

/// Directory that holds one workflow's helper scripts and descriptors.
pub struct AuxiliaryStore {
    root_path: PathBuf,
}

impl AuxiliaryStore {
    pub fn new(root_path: PathBuf) -> Self {
        AuxiliaryStore { root_path }
    }

    pub fn root(&self) -> &Path {
        &self.root_path
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.root_path.join(name)
    }

    pub fn save(&self, name: &str, content: &str) -> Result<bool, AppError> {
        let path = self.path_for(name);
        let written = write_atomic(&path, content.as_bytes())?;
        if written {
            tracing::debug!("wrote {}", path.display());
        }
        Ok(written)
    }

    pub fn load(&self, name: &str) -> Result<String, AppError> {
        let path = self.path_for(name);
        fs::read_to_string(&path)
            .map_err(|e| AppError::operation(format!("failed to read {}", path.display()), e).with_code("AW-OPS-064"))
    }

    /// Names of the regular files currently in the directory, sorted.
    pub fn list_files(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.root_path) else {
            return vec![];
        };
        let mut names: Vec<String> = entries
            .flatten()
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .collect();
        names.sort();
        names
    }

    /// Delete files the current compile no longer produces.
    pub fn remove_stale(&self, keep: &BTreeSet<String>) -> Result<Vec<String>, AppError> {
        let mut removed = Vec::new();
        for name in self.list_files() {
            if keep.contains(&name) {
                continue;
            }
            let path = self.path_for(&name);
            fs::remove_file(&path).map_err(|e| {
                AppError::operation(format!("failed to remove stale file {}", path.display()), e)
                    .with_code("AW-OPS-065")
            })?;
            tracing::debug!("removed stale {}", path.display());
            removed.push(name);
        }
        Ok(removed)
    }
}
