//! Accumulated integration: the candidate is merged with an explicit merge
//! commit whose message lists every commit it brings in.

use tracing::info;

use crate::error::{IntegrationError, Outcome, Step};
use crate::git::{GitError, MergeResult, Repository};
use crate::graph::{accumulated_message, commit_count, commits_between};
use crate::types::StrategyKind;

use super::presteps::{candidate_author, candidate_exists, try_fast_forward};
use super::{Integration, IntegrationContext, StepTrail, Strategy};

#[derive(Debug, Clone, Copy, Default)]
pub struct AccumulatedStrategy;

impl Strategy for AccumulatedStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Accumulated
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

        if !candidate_exists(repo, ctx, Step::Accumulate)? {
            let reason = format!("{} no longer exists", ctx.candidate);
            trail.skipped(Step::Accumulate, &reason);
            return Ok(Outcome::nothing_to_do(reason));
        }
        let author = candidate_author(repo, ctx)?;

        let commits = commits_between(repo, &ctx.candidate.head, ctx.integration_tip)?;
        if commits.is_empty() {
            let reason = format!(
                "{} has no commits missing from {}; it is already integrated",
                ctx.candidate, ctx.integration_branch
            );
            trail.failed(Step::CommitLog, &reason);
            return Err(IntegrationError::refused(Step::CommitLog, reason));
        }
        trail.done(Step::CommitLog, format!("{} commit(s)", commits.len()));
        let message = accumulated_message(&ctx.candidate.name, &commits);

        let merge_failed = |source: GitError| {
            IntegrationError::failed(
                Step::Accumulate,
                format!("merging {} into {}", ctx.candidate, ctx.integration_branch),
                source,
            )
        };

        match repo
            .merge_no_fast_forward(&ctx.candidate.head, &message, &author)
            .map_err(merge_failed)?
        {
            MergeResult::Staged => {
                info!(
                    candidate = %ctx.candidate,
                    commits = commits.len(),
                    author = %author,
                    "Merged candidate"
                );
                trail.done(Step::Accumulate, format!("merge of {} staged", ctx.candidate));
                Ok(Outcome::Completed(Integration::Staged { message, author }))
            }
            MergeResult::Conflict { conflicting_files } => {
                let details = format!("conflicts in {}", conflicting_files.join(", "));
                trail.failed(Step::Accumulate, &details);
                Err(merge_failed(GitError::MergeConflict { details }))
            }
            other => {
                let reason = format!(
                    "merging {} produced no merge ({:?}); it is likely already integrated",
                    ctx.candidate, other
                );
                trail.failed(Step::Accumulate, &reason);
                Err(IntegrationError::refused(Step::Accumulate, reason))
            }
        }
    }
}
