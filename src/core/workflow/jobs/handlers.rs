#![allow(clippy::result_large_err)]

//! One job per enabled safe output. Each reads the sanitized agent output
//! and performs the GitHub write the agent asked for.

use super::{agent_output_download_steps, handler_condition, Job, JobBuildContext, AGENT_JOB, PATCH_ARTIFACT};
use crate::core::error::AppError;
use crate::core::workflow::jobs::agent::PATCH_DIR;
use crate::core::workflow::model::{PermissionLevel, PermissionSet, SafeOutputKind, SafeOutputsConfig};
use crate::core::workflow::pins;
use crate::core::workflow::safe_outputs::{script_name, HandlerConfig};
use crate::core::workflow::steps::Step;
use crate::core::workflow::tools::effective_safe_output_token;

const HANDLER_TIMEOUT_MINUTES: i64 = 10;

/// Permissions each handler needs to do its write.
pub fn handler_permissions(kind: SafeOutputKind) -> PermissionSet {
    use PermissionLevel::{Read, Write};
    let pairs: &[(&str, PermissionLevel)] = match kind {
        SafeOutputKind::CreateIssue
        | SafeOutputKind::UpdateIssue
        | SafeOutputKind::CloseIssue
        | SafeOutputKind::AssignMilestone => &[("contents", Read), ("issues", Write)],
        SafeOutputKind::CreateDiscussion | SafeOutputKind::UpdateDiscussion | SafeOutputKind::CloseDiscussion => {
            &[("contents", Read), ("discussions", Write)]
        }
        SafeOutputKind::AddComment => &[
            ("contents", Read),
            ("discussions", Write),
            ("issues", Write),
            ("pull-requests", Write),
        ],
        SafeOutputKind::CreatePullRequest => &[("contents", Write), ("issues", Write), ("pull-requests", Write)],
        SafeOutputKind::CreatePullRequestReviewComment
        | SafeOutputKind::UpdatePullRequest
        | SafeOutputKind::AddReviewer => &[("contents", Read), ("pull-requests", Write)],
        SafeOutputKind::AddLabels => &[("contents", Read), ("issues", Write), ("pull-requests", Write)],
        SafeOutputKind::PushToPullRequestBranch => &[("contents", Write), ("pull-requests", Read)],
        SafeOutputKind::MissingTool => &[("contents", Read)],
    };
    PermissionSet::from_pairs(pairs)
}

/// Outputs the helper sets, exposed on the job.
fn handler_outputs(kind: SafeOutputKind) -> &'static [&'static str] {
    match kind {
        SafeOutputKind::CreateIssue => &["issue_number", "issue_url"],
        SafeOutputKind::CreateDiscussion => &["discussion_number", "discussion_url"],
        SafeOutputKind::AddComment => &["comment_id", "comment_url"],
        SafeOutputKind::CreatePullRequest => &["pull_request_number", "pull_request_url", "branch_name"],
        SafeOutputKind::PushToPullRequestBranch => &["branch_name"],
        SafeOutputKind::MissingTool => &["tools_reported", "total_count"],
        _ => &[],
    }
}

fn build_handler_job(
    ctx: &mut JobBuildContext<'_>,
    outputs: &SafeOutputsConfig,
    kind: SafeOutputKind,
) -> Result<Job, AppError> {
    let model = ctx.model;
    let Some(entry) = outputs.outputs.get(&kind) else {
        return Err(AppError::compiler_bug(format!("no configuration for safe output '{}'", kind.key()))
            .with_code("AW-BUG-050"));
    };
    let job_id = kind.job_name();
    let mut job = Job::new(job_id, ctx.runner());
    job.needs = vec![AGENT_JOB.to_string()];
    job.if_condition = Some(handler_condition(&kind.output_type()));
    job.permissions = handler_permissions(kind);
    job.timeout_minutes = Some(HANDLER_TIMEOUT_MINUTES);

    for step in agent_output_download_steps()? {
        job.push(step);
    }

    let token = effective_safe_output_token(
        entry.github_token.as_deref(),
        outputs.github_token.as_deref(),
        model.github_token.as_deref(),
    );
    if kind.needs_git() {
        job.push(
            Step::uses("Download patch artifact", pins::pinned("actions/download-artifact", "v6")?)
                .allow_failure()
                .input("name", PATCH_ARTIFACT)
                .input("path", PATCH_DIR),
        );
        job.push(
            Step::uses("Checkout repository", pins::pinned("actions/checkout", "v5")?)
                .input("fetch-depth", "0")
                .input("token", token.as_str()),
        );
        job.push(Step::run(
            "Configure Git credentials",
            "git config --global user.email \"github-actions[bot]@users.noreply.github.com\"\ngit config --global user.name \"github-actions[bot]\"\n",
        ));
    } else {
        job.push(ctx.helper_checkout_step()?);
    }

    let config = HandlerConfig::new(kind, entry, outputs.max_patch_size).to_json()?;
    let display = format!("Run {}", kind.job_name().replace('_', " "));
    let mut step = ctx
        .script_step(&display, script_name(kind))?
        .id(job_id)
        .env("GH_AW_AGENT_OUTPUT", "${{ env.GH_AW_AGENT_OUTPUT }}")
        .env("GH_AW_HANDLER_CONFIG", config)
        .env("GH_AW_WORKFLOW_NAME", model.name.as_str());
    if outputs.staged {
        step = step.env("GH_AW_SAFE_OUTPUTS_STAGED", "true");
    }
    step = step
        .envs(outputs.env.iter().map(|(k, v)| (k.clone(), v.clone())))
        .input("github-token", token);
    job.push(step);

    for name in handler_outputs(kind) {
        job.outputs
            .insert(name.to_string(), format!("${{{{ steps.{}.outputs.{} }}}}", job_id, name));
    }
    Ok(job)
}

/// Handler jobs for every enabled kind, in kind order.
pub fn build_handler_jobs(ctx: &mut JobBuildContext<'_>) -> Result<Vec<Job>, AppError> {
    let model = ctx.model;
    let Some(outputs) = &model.safe_outputs else {
        return Ok(vec![]);
    };
    let kinds: Vec<SafeOutputKind> = outputs.outputs.keys().copied().collect();
    let mut jobs = Vec::with_capacity(kinds.len());
    for kind in kinds {
        tracing::debug!("adding handler job for {}", kind.key());
        jobs.push(build_handler_job(ctx, outputs, kind)?);
    }
    Ok(jobs)
}
