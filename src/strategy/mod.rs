//! Strategies for bringing a candidate change onto the integration branch.
//!
//! Every strategy first tries the cheap paths shared through [`presteps`]: a
//! plain fast-forward, and for squash a single-commit rebase. Only when those
//! do not apply does it fall back to its own way of combining history.
//!
//! Strategies run with the integration branch checked out at its remote tip.
//! They either move the branch themselves ([`Integration::FastForwarded`],
//! [`Integration::Rebased`]) or leave a staged result for the coordinator to
//! commit ([`Integration::Staged`]).

mod accumulated;
mod fast_forward;
mod presteps;
mod squash;

use serde::{Deserialize, Serialize};

use crate::error::{IntegrationError, Outcome, Step};
use crate::git::Repository;
use crate::types::{Branch, Identity, Sha, StrategyKind};

pub use accumulated::AccumulatedStrategy;
pub use fast_forward::FastForwardOnlyStrategy;
pub use squash::SquashStrategy;

/// What a strategy operates on.
#[derive(Debug, Clone, Copy)]
pub struct IntegrationContext<'a> {
    /// Remote-tracking candidate branch; its head is the revision to integrate.
    pub candidate: &'a Branch,
    /// Local name of the integration branch, checked out.
    pub integration_branch: &'a str,
    /// Head of the integration branch before the strategy ran.
    pub integration_tip: &'a Sha,
}

/// How the integration branch was advanced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Integration {
    /// The branch now points at the candidate commit itself.
    FastForwarded { head: Sha },
    /// The candidate commit was replayed onto the branch.
    Rebased { head: Sha },
    /// Changes are staged; committing them completes the integration.
    Staged { message: String, author: Identity },
}

impl Integration {
    /// Head of the integration branch, if no commit is still pending.
    pub fn head(&self) -> Option<&Sha> {
        match self {
            Integration::FastForwarded { head } | Integration::Rebased { head } => Some(head),
            Integration::Staged { .. } => None,
        }
    }
}

/// A way of integrating changes.
pub trait Strategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Integrates `ctx.candidate` into the checked-out integration branch.
    fn integrate(
        &self,
        repo: &dyn Repository,
        ctx: &IntegrationContext<'_>,
        trail: &mut StepTrail,
    ) -> Result<Outcome<Integration>, IntegrationError>;
}

/// The strategy implementing `kind`.
pub fn strategy_for(kind: StrategyKind) -> &'static dyn Strategy {
    match kind {
        StrategyKind::FastForwardOnly => &FastForwardOnlyStrategy,
        StrategyKind::Squash => &SquashStrategy,
        StrategyKind::Accumulated => &AccumulatedStrategy,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Done,
    Failed,
    Skipped,
}

/// One attempted step and how it went.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: Step,
    pub status: StepStatus,
    pub detail: String,
}

/// Ordered record of the steps an integration attempt went through.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepTrail(Vec<StepRecord>);

impl StepTrail {
    pub fn done(&mut self, step: Step, detail: impl Into<String>) {
        self.record(step, StepStatus::Done, detail);
    }

    pub fn failed(&mut self, step: Step, detail: impl Into<String>) {
        self.record(step, StepStatus::Failed, detail);
    }

    pub fn skipped(&mut self, step: Step, detail: impl Into<String>) {
        self.record(step, StepStatus::Skipped, detail);
    }

    fn record(&mut self, step: Step, status: StepStatus, detail: impl Into<String>) {
        self.0.push(StepRecord {
            step,
            status,
            detail: detail.into(),
        });
    }

    pub fn records(&self) -> &[StepRecord] {
        &self.0
    }

    /// Status of the most recent record for `step`.
    pub fn status_of(&self, step: Step) -> Option<StepStatus> {
        self.0.iter().rev().find(|r| r.step == step).map(|r| r.status)
    }
}
