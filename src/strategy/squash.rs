//! Squash integration: the candidate's net change lands as one new commit
//! authored by the candidate's author.

use tracing::info;

use crate::error::{IntegrationError, Outcome, Step};
use crate::git::{GitError, Repository, SquashResult};
use crate::graph::commit_count;
use crate::types::StrategyKind;

use super::presteps::{candidate_author, candidate_exists, try_fast_forward, try_rebase};
use super::{Integration, IntegrationContext, StepTrail, Strategy};

#[derive(Debug, Clone, Copy, Default)]
pub struct SquashStrategy;

impl Strategy for SquashStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Squash
    }

    fn integrate(
        &self,
        repo: &dyn Repository,
        ctx: &IntegrationContext<'_>,
        trail: &mut StepTrail,
    ) -> Result<Outcome<Integration>, IntegrationError> {
        let count = commit_count(repo, &ctx.candidate.head, ctx.integration_tip)?;

        if let Some(head) = try_fast_forward(repo, ctx, count, trail)? {
            return Ok(Outcome::Completed(Integration::FastForwarded { head }));
        }
        if let Some(head) = try_rebase(repo, ctx, count, trail)? {
            return Ok(Outcome::Completed(Integration::Rebased { head }));
        }

        if !candidate_exists(repo, ctx, Step::Squash)? {
            let reason = format!("{} no longer exists", ctx.candidate);
            trail.skipped(Step::Squash, &reason);
            return Ok(Outcome::nothing_to_do(reason));
        }
        let author = candidate_author(repo, ctx)?;

        let result = repo.merge_squash(&ctx.candidate.head).map_err(|source| {
            IntegrationError::failed(
                Step::Squash,
                format!("squashing {} into {}", ctx.candidate, ctx.integration_branch),
                source,
            )
        })?;

        match result {
            SquashResult::Staged {
                message: Some(message),
            } => {
                info!(
                    candidate = %ctx.candidate,
                    commits = count,
                    author = %author,
                    "Squashed candidate"
                );
                trail.done(Step::Squash, format!("{} commit(s) squashed", count));
                Ok(Outcome::Completed(Integration::Staged { message, author }))
            }
            SquashResult::Staged { message: None } => {
                let reason = format!(
                    "nothing to squash; {} is likely already integrated in {}",
                    ctx.candidate, ctx.integration_branch
                );
                trail.failed(Step::Squash, &reason);
                Err(IntegrationError::refused(Step::Squash, reason))
            }
            SquashResult::Conflict { conflicting_files } => {
                let details = format!("conflicts in {}", conflicting_files.join(", "));
                trail.failed(Step::Squash, &details);
                Err(IntegrationError::failed(
                    Step::Squash,
                    format!("squashing {} into {}", ctx.candidate, ctx.integration_branch),
                    GitError::MergeConflict { details },
                ))
            }
        }
    }
}
