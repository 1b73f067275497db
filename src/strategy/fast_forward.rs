//! Fast-forward-only integration: the integration branch may only move to a
//! candidate that sits directly on top of it.

use crate::error::{IntegrationError, Outcome, Step};
use crate::git::Repository;
use crate::graph::commit_count;
use crate::types::StrategyKind;

use super::presteps::try_fast_forward;
use super::{Integration, IntegrationContext, StepTrail, Strategy};

#[derive(Debug, Clone, Copy, Default)]
pub struct FastForwardOnlyStrategy;

impl Strategy for FastForwardOnlyStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::FastForwardOnly
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

        let reason = match count {
            0 => format!(
                "{} has no commits missing from {}; it is already integrated",
                ctx.candidate, ctx.integration_branch
            ),
            1 => format!(
                "{} is not based on the tip of {}",
                ctx.candidate, ctx.integration_branch
            ),
            n => format!(
                "{} is {} commits ahead of {}; only a single commit can be fast-forwarded",
                ctx.candidate, n, ctx.integration_branch
            ),
        };
        Err(IntegrationError::refused(Step::FastForward, reason))
    }
}
