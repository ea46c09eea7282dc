#![allow(clippy::result_large_err)]

//! Jobs of the generated workflow and the dependency graph between them.

pub mod activation;
pub mod agent;
pub mod custom;
pub mod handlers;

use crate::core::context::CompilerContext;
use crate::core::error::AppError;
use crate::core::types::ActionMode;
use crate::core::workflow::model::{PermissionSet, WorkflowModel};
use crate::core::workflow::pins;
use crate::core::workflow::scripts::github_script_step;
use crate::core::workflow::steps::{Step, StepEntry};
use indexmap::IndexMap;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde_yaml::Value;
use std::collections::{BTreeSet, HashMap};

pub const ACTIVATION_JOB: &str = "activation";
pub const AGENT_JOB: &str = "agent";
pub const AGENT_OUTPUT_ARTIFACT: &str = "agent_output.json";
pub const PATCH_ARTIFACT: &str = "aw.patch";

/// Job names the compiler owns.
pub const RESERVED_JOB_NAMES: &[&str] = &[ACTIVATION_JOB, AGENT_JOB, "pre_activation", "detection", "conclusion"];

#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: String,
    pub display_name: Option<String>,
    pub needs: Vec<String>,
    pub if_condition: Option<String>,
    pub runs_on: Value,
    pub environment: Option<Value>,
    pub permissions: PermissionSet,
    pub concurrency: Option<Value>,
    pub container: Option<Value>,
    pub services: Option<Value>,
    pub env: IndexMap<String, String>,
    pub outputs: IndexMap<String, String>,
    pub timeout_minutes: Option<i64>,
    pub steps: Vec<StepEntry>,
}

impl Job {
    pub fn new<T: Into<String>>(id: T, runs_on: Value) -> Self {
        Job {
            id: id.into(),
            display_name: None,
            needs: vec![],
            if_condition: None,
            runs_on,
            environment: None,
            permissions: PermissionSet::empty(),
            concurrency: None,
            container: None,
            services: None,
            env: IndexMap::new(),
            outputs: IndexMap::new(),
            timeout_minutes: None,
            steps: vec![],
        }
    }

    pub fn push<S: Into<StepEntry>>(&mut self, step: S) {
        self.steps.push(step.into());
    }
}

/// Whether a job configuration's `needs` (string or list) names the agent job.
pub fn job_depends_on_agent(config: &Value) -> bool {
    match config.get("needs") {
        Some(Value::String(need)) => need == AGENT_JOB,
        Some(Value::Sequence(needs)) => needs.iter().any(|need| need.as_str() == Some(AGENT_JOB)),
        _ => false,
    }
}

/// State shared by the job builders of one compile.
pub struct JobBuildContext<'a> {
    pub model: &'a WorkflowModel,
    pub context: &'a CompilerContext,
    pub action_mode: ActionMode,
    pub default_runs_on: &'a str,
    /// Helper directory, relative to the repository root
    pub aux_rel: &'a str,
    /// File name of the workflow source inside `.github/workflows/`
    pub source_file: &'a str,
    scripts: BTreeSet<String>,
}

impl<'a> JobBuildContext<'a> {
    pub fn new(
        model: &'a WorkflowModel,
        context: &'a CompilerContext,
        action_mode: ActionMode,
        default_runs_on: &'a str,
        aux_rel: &'a str,
        source_file: &'a str,
    ) -> Self {
        JobBuildContext {
            model,
            context,
            action_mode,
            default_runs_on,
            aux_rel,
            source_file,
            scripts: BTreeSet::new(),
        }
    }

    /// A github-script step running helper `name`; the helper is recorded
    /// so it gets written next to the lock file.
    pub fn script_step(&mut self, display_name: &str, name: &str) -> Result<Step, AppError> {
        self.use_script(name);
        github_script_step(display_name, self.aux_rel, name)
    }

    pub fn use_script(&mut self, name: &str) {
        self.scripts.insert(name.to_string());
    }

    /// Helpers referenced by the jobs built so far.
    pub fn used_scripts(&self) -> &BTreeSet<String> {
        &self.scripts
    }

    pub fn runner(&self) -> Value {
        Value::from(self.default_runs_on)
    }

    /// Checkout that makes the helper directory available. Release mode
    /// fetches only that directory.
    pub fn helper_checkout_step(&self) -> Result<Step, AppError> {
        let step = Step::uses("Checkout helper scripts", pins::pinned("actions/checkout", "v5")?)
            .input("persist-credentials", "false");
        Ok(match self.action_mode {
            ActionMode::Release => step
                .input("sparse-checkout", format!("{}\n", self.aux_rel))
                .input("sparse-checkout-cone-mode", "false"),
            ActionMode::Dev => step,
        })
    }
}

/// Download the sanitized agent output and point `GH_AW_AGENT_OUTPUT` at it.
pub fn agent_output_download_steps() -> Result<Vec<StepEntry>, AppError> {
    Ok(vec![
        Step::uses("Download agent output artifact", pins::pinned("actions/download-artifact", "v6")?)
            .allow_failure()
            .input("name", AGENT_OUTPUT_ARTIFACT)
            .input("path", "/tmp/gh-aw/safeoutputs/")
            .into(),
        Step::run(
            "Setup agent output environment variable",
            format!(
                "mkdir -p /tmp/gh-aw/safeoutputs/\nfind \"/tmp/gh-aw/safeoutputs/\" -type f -print\necho \"GH_AW_AGENT_OUTPUT=/tmp/gh-aw/safeoutputs/{}\" >> \"$GITHUB_ENV\"\n",
                AGENT_OUTPUT_ARTIFACT
            ),
        )
        .into(),
    ])
}

/// `!cancelled()` plus a check that the agent emitted `output_type`.
pub fn handler_condition(output_type: &str) -> String {
    format!(
        "!cancelled() && needs.{}.result != 'skipped' && contains(needs.{}.outputs.output_types, '{}')",
        AGENT_JOB, AGENT_JOB, output_type
    )
}

/// Ordered set of jobs with dependency checks.
#[derive(Debug, Default)]
pub struct JobManager {
    jobs: IndexMap<String, Job>,
}

impl JobManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_job(&mut self, job: Job) -> Result<(), AppError> {
        if self.jobs.contains_key(&job.id) {
            return Err(AppError::validation(format!("job '{}' is defined more than once", job.id))
                .with_code("AW-VAL-140")
                .with_field(format!("jobs.{}", job.id)));
        }
        tracing::debug!("adding job '{}' (needs: {:?})", job.id, job.needs);
        self.jobs.insert(job.id.clone(), job);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Job> {
        self.jobs.get(id)
    }

    pub fn job_names(&self) -> Vec<String> {
        self.jobs.keys().cloned().collect()
    }

    pub fn jobs(&self) -> impl Iterator<Item = &Job> {
        self.jobs.values()
    }

    fn graph(&self) -> (DiGraph<&str, ()>, HashMap<&str, NodeIndex>) {
        let mut graph = DiGraph::new();
        let mut nodes = HashMap::new();
        for id in self.jobs.keys() {
            nodes.insert(id.as_str(), graph.add_node(id.as_str()));
        }
        for job in self.jobs.values() {
            for need in &job.needs {
                if let (Some(from), Some(to)) = (nodes.get(need.as_str()), nodes.get(job.id.as_str())) {
                    graph.add_edge(*from, *to, ());
                }
            }
        }
        (graph, nodes)
    }

    /// Every `needs` target exists and the graph has no cycle.
    pub fn validate_dependencies(&self) -> Result<(), AppError> {
        let mut errors = Vec::new();
        for job in self.jobs.values() {
            for need in &job.needs {
                if !self.jobs.contains_key(need) {
                    errors.push(
                        AppError::validation(format!("job '{}' depends on non-existent job '{}'", job.id, need))
                            .with_code("AW-VAL-141")
                            .with_field(format!("jobs.{}.needs", job.id))
                            .with_value(need),
                    );
                }
            }
        }

        let (graph, _) = self.graph();
        for component in tarjan_scc(&graph) {
            let is_cycle = component.len() > 1 || component.iter().any(|node| graph.contains_edge(*node, *node));
            if is_cycle {
                let mut names: Vec<&str> = component.iter().map(|node| graph[*node]).collect();
                names.sort();
                errors.push(
                    AppError::validation(format!("cycle detected between jobs: {}", names.join(" -> ")))
                        .with_code("AW-VAL-142")
                        .with_field("jobs"),
                );
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::batch(crate::core::types::ErrorCategory::ValidationError, errors))
        }
    }

    /// Dependencies first; ties broken by name so the order is stable.
    pub fn get_topological_order(&self) -> Result<Vec<String>, AppError> {
        self.validate_dependencies()?;
        let mut remaining: HashMap<&str, usize> = self
            .jobs
            .values()
            .map(|job| (job.id.as_str(), job.needs.len()))
            .collect();
        let mut ready: BTreeSet<&str> = remaining
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut order = Vec::with_capacity(self.jobs.len());

        while let Some(next) = ready.pop_first() {
            order.push(next.to_string());
            remaining.remove(next);
            for job in self.jobs.values() {
                if job.needs.iter().any(|need| need == next) {
                    if let Some(count) = remaining.get_mut(job.id.as_str()) {
                        *count -= 1;
                        if *count == 0 {
                            ready.insert(job.id.as_str());
                        }
                    }
                }
            }
        }

        if order.len() != self.jobs.len() {
            return Err(AppError::compiler_bug("job graph could not be ordered").with_code("AW-BUG-020"));
        }
        Ok(order)
    }

    /// `(need, job)` edges in topological order.
    pub fn edges(&self) -> Result<Vec<(String, String)>, AppError> {
        let mut edges = Vec::new();
        for id in self.get_topological_order()? {
            if let Some(job) = self.jobs.get(&id) {
                for need in &job.needs {
                    edges.push((need.clone(), id.clone()));
                }
            }
        }
        Ok(edges)
    }
}
