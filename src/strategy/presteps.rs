//! Steps shared by several strategies.

use tracing::{debug, info};

use crate::error::{IntegrationError, Step};
use crate::git::{GitError, MergeResult, RebaseResult, Repository};
use crate::types::{Identity, Sha};

use super::{IntegrationContext, StepTrail};

fn not_single_commit(count: usize) -> String {
    match count {
        0 => "no commits ahead of the integration branch".to_string(),
        n => format!("{} commits ahead of the integration branch", n),
    }
}

/// Fast-forwards the integration branch to the candidate when the candidate
/// is exactly one commit ahead.
///
/// Returns the new head, or `None` when the fast-forward does not apply.
pub(crate) fn try_fast_forward(
    repo: &dyn Repository,
    ctx: &IntegrationContext<'_>,
    count: usize,
    trail: &mut StepTrail,
) -> Result<Option<Sha>, IntegrationError> {
    if count != 1 {
        trail.skipped(Step::FastForward, not_single_commit(count));
        return Ok(None);
    }

    let result = repo
        .merge_fast_forward_only(&ctx.candidate.head)
        .map_err(|source| {
            IntegrationError::failed(
                Step::FastForward,
                format!("fast-forwarding {} to {}", ctx.integration_branch, ctx.candidate),
                source,
            )
        })?;

    match result {
        MergeResult::FastForwarded { commit_sha } => {
            info!(
                branch = ctx.integration_branch,
                head = %commit_sha.short(),
                "Fast-forwarded integration branch"
            );
            trail.done(
                Step::FastForward,
                format!("{} now at {}", ctx.integration_branch, commit_sha.short()),
            );
            Ok(Some(commit_sha))
        }
        other => {
            debug!(result = ?other, "Fast-forward not possible");
            trail.failed(
                Step::FastForward,
                format!("{} has diverged from {}", ctx.candidate, ctx.integration_branch),
            );
            Ok(None)
        }
    }
}

/// Replays a single candidate commit onto the integration branch and
/// fast-forwards the branch to it.
///
/// Returns the new head, or `None` when the rebase does not apply or stops
/// on a conflict. Fails if the rebase leaves the branch unchanged, since the
/// commit then brings nothing new.
pub(crate) fn try_rebase(
    repo: &dyn Repository,
    ctx: &IntegrationContext<'_>,
    count: usize,
    trail: &mut StepTrail,
) -> Result<Option<Sha>, IntegrationError> {
    if count != 1 {
        trail.skipped(Step::Rebase, not_single_commit(count));
        return Ok(None);
    }

    let rebase_failed = |source: GitError| {
        IntegrationError::failed(
            Step::Rebase,
            format!("rebasing {} onto {}", ctx.candidate, ctx.integration_branch),
            source,
        )
    };

    let result = repo
        .rebase(&ctx.candidate.head, ctx.integration_branch)
        .map_err(rebase_failed)?;
    // The rebase ran on a detached HEAD either way
    repo.checkout(ctx.integration_branch).map_err(|source| {
        IntegrationError::failed(
            Step::Checkout,
            format!("returning to {} after rebase", ctx.integration_branch),
            source,
        )
    })?;

    let rebased = match result {
        RebaseResult::Rebased { head } => head,
        RebaseResult::Conflict { conflicting_files } => {
            debug!(files = ?conflicting_files, "Rebase stopped on conflicts");
            trail.failed(
                Step::Rebase,
                format!("conflicts in {}", conflicting_files.join(", ")),
            );
            return Ok(None);
        }
    };

    match repo.merge_fast_forward_only(&rebased).map_err(rebase_failed)? {
        MergeResult::FastForwarded { commit_sha } if &commit_sha != ctx.integration_tip => {
            info!(
                branch = ctx.integration_branch,
                head = %commit_sha.short(),
                "Rebased candidate onto integration branch"
            );
            trail.done(
                Step::Rebase,
                format!("{} now at {}", ctx.integration_branch, commit_sha.short()),
            );
            Ok(Some(commit_sha))
        }
        MergeResult::FastForwarded { .. } | MergeResult::AlreadyUpToDate => {
            let empty = repo
                .is_empty_commit(&ctx.candidate.head)
                .map_err(rebase_failed)?;
            let reason = if empty {
                format!("commit {} is empty", ctx.candidate.head.short())
            } else {
                format!(
                    "commit {} is already integrated in {}",
                    ctx.candidate.head.short(),
                    ctx.integration_branch
                )
            };
            trail.failed(Step::Rebase, &reason);
            Err(IntegrationError::refused(Step::Rebase, reason))
        }
        other => {
            debug!(result = ?other, "Rebased commit does not fast-forward");
            trail.failed(Step::Rebase, "rebased commit does not fast-forward");
            Ok(None)
        }
    }
}

/// Whether the candidate still exists on its remote.
pub(crate) fn candidate_exists(
    repo: &dyn Repository,
    ctx: &IntegrationContext<'_>,
    step: Step,
) -> Result<bool, IntegrationError> {
    let branches = repo.list_remote_branches().map_err(|source| {
        IntegrationError::failed(step, "listing remote branches", source)
    })?;
    Ok(branches.iter().any(|b| b.name == ctx.candidate.name))
}

/// Author of the candidate's last commit, used for synthesized commits.
pub(crate) fn candidate_author(
    repo: &dyn Repository,
    ctx: &IntegrationContext<'_>,
) -> Result<Identity, IntegrationError> {
    match repo.find_commit(&ctx.candidate.head) {
        Ok(commit) => Ok(commit.author),
        Err(source @ GitError::MalformedIdentity(_)) => Err(IntegrationError::failed(
            Step::Author,
            format!(
                "author of {} is not of the form 'Name <email>'",
                ctx.candidate.head.short()
            ),
            source,
        )),
        Err(source) => Err(IntegrationError::failed(
            Step::Author,
            format!("reading commit {}", ctx.candidate.head.short()),
            source,
        )),
    }
}
