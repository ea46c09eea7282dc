#![allow(clippy::result_large_err)]

//! Jobs declared under `safe-outputs.jobs`.

use super::{agent_output_download_steps, handler_condition, job_depends_on_agent, Job, JobBuildContext, AGENT_JOB, RESERVED_JOB_NAMES};
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use crate::core::workflow::model::{PermissionSet, SafeJobConfig, SafeOutputKind};
use crate::core::workflow::pins;
use crate::core::workflow::steps::StepEntry;
use crate::core::workflow::tools::effective_safe_output_token;
use crate::core::workflow::values::get_path;
use serde_yaml::Value;

fn check_name(job_id: &str) -> Option<AppError> {
    let taken = RESERVED_JOB_NAMES.contains(&job_id) || SafeOutputKind::ALL.iter().any(|kind| kind.job_name() == job_id);
    taken.then(|| {
        AppError::validation(format!("safe job '{}' collides with a job the compiler generates", job_id))
            .with_code("AW-VAL-143")
            .with_field(format!("safe-outputs.jobs.{}", job_id))
            .with_suggestion("rename the job")
    })
}

fn build_custom_job(ctx: &JobBuildContext<'_>, config: &SafeJobConfig) -> Result<Job, AppError> {
    let model = ctx.model;
    let job_id = config.job_id();
    let mut job = Job::new(job_id.as_str(), config.runs_on.clone().unwrap_or_else(|| ctx.runner()));

    let raw = get_path(&model.front_matter, &["safe-outputs", "jobs", config.name.as_str()]);
    if !raw.is_some_and(job_depends_on_agent) {
        job.needs.push(AGENT_JOB.to_string());
    }
    job.needs.extend(config.needs.iter().cloned());

    let gate = handler_condition(&job_id);
    job.if_condition = Some(match &config.if_condition {
        Some(condition) => format!("({}) && ({})", gate, condition),
        None => gate,
    });
    job.permissions = match &config.permissions {
        Some(value) => PermissionSet::parse(value).map_err(|e| e.with_field(format!("safe-outputs.jobs.{}.permissions", config.name)))?,
        None => PermissionSet::empty(),
    };

    job.env = config.env.clone();
    job.env
        .insert("GH_AW_AGENT_OUTPUT".into(), "${{ env.GH_AW_AGENT_OUTPUT }}".into());
    if model.safe_outputs.as_ref().is_some_and(|outputs| outputs.staged) {
        job.env.insert("GH_AW_SAFE_OUTPUTS_STAGED".into(), "true".into());
    }
    let token = effective_safe_output_token(
        config.github_token.as_deref(),
        model.safe_outputs.as_ref().and_then(|outputs| outputs.github_token.as_deref()),
        model.github_token.as_deref(),
    );
    job.env.insert("GITHUB_TOKEN".into(), token);

    for step in agent_output_download_steps()? {
        job.push(step);
    }
    for step in &config.steps {
        let mut step: Value = step.clone();
        pins::pin_user_step(&mut step, model.strict, ctx.context)?;
        job.push(StepEntry::Raw(step));
    }
    if let Some(output) = &config.output {
        job.outputs.insert("output".into(), output.clone());
    }
    Ok(job)
}

/// Jobs for every `safe-outputs.jobs` entry, in declaration order.
pub fn build_custom_jobs(ctx: &JobBuildContext<'_>) -> Result<Vec<Job>, AppError> {
    let Some(outputs) = &ctx.model.safe_outputs else {
        return Ok(vec![]);
    };
    let mut errors: Vec<AppError> = outputs.jobs.values().filter_map(|config| check_name(&config.job_id())).collect();
    if !errors.is_empty() {
        return Err(if errors.len() == 1 {
            errors.remove(0)
        } else {
            AppError::batch(ErrorCategory::ValidationError, errors)
        });
    }
    outputs.jobs.values().map(|config| build_custom_job(ctx, config)).collect()
}
