#![allow(clippy::result_large_err)]

//! The activation job: gates the run before the agent starts.

use super::{Job, JobBuildContext, ACTIVATION_JOB};
use crate::core::error::AppError;
use crate::core::workflow::model::{PermissionLevel, PermissionSet};

pub const ACTIVATED_OUTPUT: &str = "activated";
const STOP_TIME_STEP_ID: &str = "check_stop_time";

/// Conditions written on the activation job, ANDed in order.
fn activation_condition(ctx: &JobBuildContext<'_>) -> Option<String> {
    let model = ctx.model;
    let mut parts: Vec<String> = Vec::new();
    if let Some(condition) = &model.if_condition {
        parts.push(condition.clone());
    }
    parts.extend(model.triggers.conditions.iter().cloned());
    match parts.len() {
        0 => None,
        1 => parts.pop(),
        _ => Some(parts.iter().map(|part| format!("({})", part)).collect::<Vec<_>>().join(" && ")),
    }
}

fn wants_reaction(ctx: &JobBuildContext<'_>) -> Option<String> {
    let reaction = ctx.model.triggers.reaction.as_deref()?;
    if reaction == "none" || !ctx.model.triggers.has_reactable_event() {
        return None;
    }
    Some(reaction.to_string())
}

pub fn build_activation_job(ctx: &mut JobBuildContext<'_>) -> Result<Job, AppError> {
    let model = ctx.model;
    let mut job = Job::new(ACTIVATION_JOB, ctx.runner());
    job.if_condition = activation_condition(ctx);
    if let Some(environment) = &model.manual_approval_env {
        job.environment = Some(serde_yaml::Value::from(environment.as_str()));
    }

    let reaction = wants_reaction(ctx);
    let mut permissions = PermissionSet::from_pairs(&[("contents", PermissionLevel::Read)]);
    if reaction.is_some() {
        for scope in ["issues", "pull-requests", "discussions"] {
            permissions.grant(scope, PermissionLevel::Write);
        }
    }
    job.permissions = permissions;

    job.push(ctx.helper_checkout_step()?);
    job.push(
        ctx.script_step("Check workflow file timestamps", "check_workflow_timestamp")?
            .env("GH_AW_WORKFLOW_FILE", ctx.source_file),
    );

    let activated = match &model.stop_time {
        Some(stop_time) => {
            job.push(
                ctx.script_step("Check stop-time limit", "check_stop_time")?
                    .id(STOP_TIME_STEP_ID)
                    .env("GH_AW_STOP_TIME", stop_time.as_str())
                    .env("GH_AW_WORKFLOW_NAME", model.name.as_str()),
            );
            format!("${{{{ steps.{}.outputs.stop_time_ok == 'true' }}}}", STOP_TIME_STEP_ID)
        }
        None => "${{ 'true' }}".to_string(),
    };

    if let Some(reaction) = reaction {
        tracing::debug!("adding '{}' reaction step", reaction);
        job.push(
            ctx.script_step(&format!("Add {} reaction to the triggering item", reaction), "add_reaction")?
                .id("react")
                .env("GH_AW_REACTION", reaction),
        );
    }

    job.outputs.insert(ACTIVATED_OUTPUT.to_string(), activated);
    job.timeout_minutes = Some(5);
    Ok(job)
}
