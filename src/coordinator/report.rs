//! The result of an integration attempt, as handed back to the host.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::IntegrationError;
use crate::strategy::{StepStatus, StepTrail};
use crate::types::{BuildResult, Sha};

/// Neutral classification of an attempt for the host's build status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildOutcome {
    /// The change was integrated and published.
    Integrated,
    /// There was nothing to integrate.
    NotBuilt,
    Failed,
}

impl fmt::Display for BuildOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BuildOutcome::Integrated => "integrated",
            BuildOutcome::NotBuilt => "not built",
            BuildOutcome::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// How the integration branch was advanced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationMethod {
    FastForward,
    Rebase,
    Squash,
    Merge,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationReport {
    pub outcome: BuildOutcome,
    /// Human-readable explanation; for failures the full error chain.
    pub diagnostic: String,
    /// Remote-qualified candidate branch, once resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<Sha>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<IntegrationMethod>,
    /// Head of the integration branch after integration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integrated_commit: Option<Sha>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_result: Option<BuildResult>,
    pub pushed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_branch: Option<String>,
    pub steps: StepTrail,
}

impl IntegrationReport {
    fn new(outcome: BuildOutcome, diagnostic: String, steps: StepTrail) -> Self {
        IntegrationReport {
            outcome,
            diagnostic,
            candidate: None,
            revision: None,
            method: None,
            integrated_commit: None,
            build_result: None,
            pushed: false,
            deleted_branch: None,
            steps,
        }
    }

    pub fn not_built(reason: impl Into<String>, steps: StepTrail) -> Self {
        Self::new(BuildOutcome::NotBuilt, reason.into(), steps)
    }

    /// A failed attempt. Records the failing step in the trail unless the
    /// step already recorded its own failure.
    pub fn failed(err: &IntegrationError, mut steps: StepTrail) -> Self {
        if let Some(step) = err.step()
            && steps.status_of(step) != Some(StepStatus::Failed)
        {
            steps.failed(step, err.to_string());
        }
        Self::new(BuildOutcome::Failed, err.diagnostic(), steps)
    }

    pub fn integrated(diagnostic: impl Into<String>, steps: StepTrail) -> Self {
        Self::new(BuildOutcome::Integrated, diagnostic.into(), steps)
    }

    pub fn is_success(&self) -> bool {
        self.outcome != BuildOutcome::Failed
    }
}

impl fmt::Display for IntegrationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}: {}", self.outcome, self.diagnostic)?;
        for record in self.steps.records() {
            let status = match record.status {
                StepStatus::Done => "done",
                StepStatus::Failed => "FAILED",
                StepStatus::Skipped => "skipped",
            };
            writeln!(f, "  {:<24} {:<8} {}", record.step.as_str(), status, record.detail)?;
        }
        Ok(())
    }
}
