#![allow(clippy::result_large_err)]

//! The compile pipeline for one workflow source.

use crate::core::config::CompilerConfig;
use crate::core::context::{version as compiler_version, CompilerContext};
use crate::core::error::AppError;
use crate::core::workflow::emit::{frontmatter_hash, render_workflow, LockDocument, LockHeader};
use crate::core::workflow::imports::ImportResolver;
use crate::core::workflow::jobs::activation::build_activation_job;
use crate::core::workflow::jobs::agent::build_agent_job;
use crate::core::workflow::jobs::custom::build_custom_jobs;
use crate::core::workflow::jobs::handlers::build_handler_jobs;
use crate::core::workflow::jobs::{JobBuildContext, JobManager};
use crate::core::workflow::model::{build_model, WorkflowModel};
use crate::core::workflow::normalize::apply_default_pipeline;
use crate::core::workflow::safe_inputs::{render_safe_inputs, SAFE_INPUTS_FILE};
use crate::core::workflow::safe_outputs::{render_tools_json, TOOLS_FILE};
use crate::core::workflow::schema::{warn_unknown_nested_keys, FrontMatterSchemaValidator};
use crate::core::workflow::scripts::ScriptRegistry;
use crate::core::workflow::stop_time::preserve_stop_time;
use crate::core::workflow::validate::SemanticValidator;
use crate::utils::files::{write_atomic, AuxiliaryStore};
use chrono::{DateTime, Utc};
use serde_yaml::{Mapping, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};

pub const LOCK_EXTENSION: &str = "lock.yml";
pub const AUX_DIR: &str = "aw";
pub const DEFAULT_CONCURRENCY_GROUP: &str = "gh-aw-${{ github.workflow }}";

/// Everything one compile produces, before anything is written.
#[derive(Debug, Clone)]
pub struct CompiledWorkflow {
    pub source_path: PathBuf,
    pub lock_path: PathBuf,
    pub lock_content: String,
    pub aux_dir: PathBuf,
    /// Side files keyed by file name inside `aux_dir`
    pub aux_files: BTreeMap<String, String>,
    /// Job ids in dependency order
    pub jobs: Vec<String>,
}

impl CompiledWorkflow {
    /// Write the aux files and the lock file. Returns whether the lock changed.
    pub fn write(&self, emit_aux_files: bool) -> Result<bool, AppError> {
        if emit_aux_files {
            let store = AuxiliaryStore::new(self.aux_dir.clone());
            for (name, content) in &self.aux_files {
                store.save(name, content)?;
            }
            let keep: BTreeSet<String> = self.aux_files.keys().cloned().collect();
            let removed = store.remove_stale(&keep)?;
            if !removed.is_empty() {
                tracing::debug!("removed {} stale helper file(s) from {}", removed.len(), self.aux_dir.display());
            }
        }
        let changed = write_atomic(&self.lock_path, self.lock_content.as_bytes())?;
        if changed {
            tracing::info!("wrote {}", self.lock_path.display());
        } else {
            tracing::debug!("{} is up to date", self.lock_path.display());
        }
        Ok(changed)
    }
}

/// `daily.md` -> `daily.lock.yml`, next to the source.
pub fn lock_path_for(source: &Path) -> PathBuf {
    source.with_extension(LOCK_EXTENSION)
}

/// Repository root for a source: the parent of the enclosing `.github`
/// directory, else the closest ancestor holding `.git`, else the source dir.
pub fn find_repo_root(source_dir: &Path) -> PathBuf {
    for ancestor in source_dir.ancestors() {
        if ancestor.file_name().is_some_and(|name| name == ".github") {
            if let Some(parent) = ancestor.parent() {
                return parent.to_path_buf();
            }
        }
    }
    source_dir
        .ancestors()
        .find(|ancestor| ancestor.join(".git").exists())
        .unwrap_or(source_dir)
        .to_path_buf()
}

/// `path` relative to `root`, `/`-separated.
pub fn relative_slash_path(path: &Path, root: &Path) -> String {
    let relative = path
        .strip_prefix(root)
        .ok()
        .map(Path::to_path_buf)
        .or_else(|| {
            let path = path.canonicalize().ok()?;
            let root = root.canonicalize().ok()?;
            path.strip_prefix(&root).ok().map(Path::to_path_buf)
        })
        .unwrap_or_else(|| path.to_path_buf());
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn concurrency_value(model: &WorkflowModel) -> Value {
    let mut map = Mapping::new();
    match &model.concurrency {
        Some(concurrency) => {
            map.insert(Value::from("group"), Value::from(concurrency.group.as_str()));
            if let Some(cancel) = concurrency.cancel_in_progress {
                map.insert(Value::from("cancel-in-progress"), Value::Bool(cancel));
            }
        }
        None => {
            map.insert(Value::from("group"), Value::from(DEFAULT_CONCURRENCY_GROUP));
        }
    }
    Value::Mapping(map)
}

pub struct Compiler {
    config: CompilerConfig,
    repo_root: Option<PathBuf>,
    now: Option<DateTime<Utc>>,
}

impl Compiler {
    pub fn new(config: CompilerConfig) -> Self {
        Self {
            config,
            repo_root: None,
            now: None,
        }
    }

    pub fn with_repo_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.repo_root = Some(root.into());
        self
    }

    /// Fix the clock used to resolve relative stop times.
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compile and write the lock file plus its side files.
    pub fn compile_file(&self, path: &Path, context: &CompilerContext) -> Result<CompiledWorkflow, AppError> {
        let compiled = self.build(path, context)?;
        compiled.write(self.config.emit_aux_files)?;
        Ok(compiled)
    }

    /// Run the pipeline without touching the file system beyond reads.
    pub fn build(&self, path: &Path, context: &CompilerContext) -> Result<CompiledWorkflow, AppError> {
        tracing::info!("compiling {}", path.display());
        let doc = crate::core::workflow::source::read_source(path)?;
        let source_dir = doc.dir();
        let stem = doc.stem();
        let source_file = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| format!("{}.md", stem));

        let mut doc = ImportResolver::new().resolve(doc)?;
        tracing::debug!("imports resolved for {}", path.display());
        doc.front_matter = apply_default_pipeline(std::mem::take(&mut doc.front_matter), context)?;

        if self.config.skip_validation {
            tracing::debug!("schema validation skipped");
        } else {
            FrontMatterSchemaValidator::new()?.validate(
                &doc.front_matter,
                &doc.path,
                &doc.front_matter_text,
                doc.front_matter_line,
            )?;
        }
        warn_unknown_nested_keys(&doc.front_matter, context);

        let mut model = build_model(&doc, context, self.config.strict)?;
        SemanticValidator::new().validate(&model, context)?;

        let lock_path = lock_path_for(path);
        if let Some(stop_after) = model.stop_after.clone() {
            let now = self.now.unwrap_or_else(Utc::now);
            model.stop_time = Some(preserve_stop_time(
                &stop_after,
                &lock_path,
                self.config.refresh_stop_time,
                now,
            )?);
        }

        let repo_root = self.repo_root.clone().unwrap_or_else(|| find_repo_root(&source_dir));
        let aux_dir = source_dir.join(AUX_DIR).join(&stem);
        let aux_rel = relative_slash_path(&aux_dir, &repo_root);
        let source_rel = relative_slash_path(path, &repo_root);

        let mut ctx = JobBuildContext::new(
            &model,
            context,
            self.config.action_mode,
            &self.config.default_runs_on,
            &aux_rel,
            &source_file,
        );
        let mut manager = JobManager::new();
        manager.add_job(build_activation_job(&mut ctx)?)?;
        manager.add_job(build_agent_job(&mut ctx)?)?;
        for job in build_handler_jobs(&mut ctx)? {
            manager.add_job(job)?;
        }
        for job in build_custom_jobs(&ctx)? {
            manager.add_job(job)?;
        }
        manager.validate_dependencies()?;
        let order = manager.get_topological_order()?;
        let used_scripts: Vec<String> = ctx.used_scripts().iter().cloned().collect();

        let header = LockHeader {
            source: source_rel,
            version: compiler_version().to_string(),
            frontmatter_hash: frontmatter_hash(&model.front_matter),
            description: model.description.clone(),
            edges: manager.edges()?,
            jobs: order.clone(),
        };
        let jobs = order
            .iter()
            .filter_map(|id| manager.get(id))
            .collect::<Vec<_>>();
        let document = LockDocument {
            header,
            name: &model.name,
            on: &model.triggers.on,
            concurrency: Some(concurrency_value(&model)),
            env: &model.env,
            jobs,
        };
        let lock_content = render_workflow(&document)?;

        let aux_files = self.aux_files(&model, &used_scripts)?;
        tracing::debug!(
            "{}: {} job(s), {} side file(s)",
            path.display(),
            order.len(),
            aux_files.len()
        );
        Ok(CompiledWorkflow {
            source_path: path.to_path_buf(),
            lock_path,
            lock_content,
            aux_dir,
            aux_files,
            jobs: order,
        })
    }

    fn aux_files(&self, model: &WorkflowModel, used_scripts: &[String]) -> Result<BTreeMap<String, String>, AppError> {
        let mut files = BTreeMap::new();
        let registry = ScriptRegistry::with_embedded()?;
        for record in registry.bundle(used_scripts.iter().map(String::as_str))? {
            files.insert(record.file_name(), record.body.clone());
        }
        if let Some(outputs) = &model.safe_outputs {
            files.insert(TOOLS_FILE.to_string(), render_tools_json(outputs)?);
        }
        if let Some(inputs) = &model.safe_inputs {
            let (descriptor, bodies) = render_safe_inputs(inputs)?;
            files.insert(SAFE_INPUTS_FILE.to_string(), descriptor);
            files.extend(bodies);
        }
        Ok(files)
    }
}
