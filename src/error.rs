//! Failure taxonomy of the integration engine.
//!
//! Hard failures are [`IntegrationError`]s. Finding nothing to integrate is not
//! a failure: operations that can legitimately come up empty return
//! [`Outcome::NothingToDo`] instead, so callers handle both explicitly.
//!
//! Errors are raised by the deepest component that detects them and travel
//! unchanged up to the coordinator, which turns them into a build outcome.
//! Nothing is retried automatically.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::git::GitError;

/// The engine step an error or trail entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    ValidateConfig,
    ResolveChange,
    Checkout,
    CommitCount,
    FastForward,
    Rebase,
    Squash,
    Accumulate,
    Author,
    CommitLog,
    Commit,
    Push,
    DeleteBranch,
    Rollback,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::ValidateConfig => "validate configuration",
            Step::ResolveChange => "resolve change",
            Step::Checkout => "checkout",
            Step::CommitCount => "count commits",
            Step::FastForward => "fast-forward",
            Step::Rebase => "rebase",
            Step::Squash => "squash",
            Step::Accumulate => "accumulated merge",
            Step::Author => "determine author",
            Step::CommitLog => "collect commit log",
            Step::Commit => "commit",
            Step::Push => "push",
            Step::DeleteBranch => "delete integrated branch",
            Step::Rollback => "rollback",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hard failures of an integration attempt.
#[derive(Debug, Error)]
pub enum IntegrationError {
    /// More than one distinct change matched the integration remote.
    #[error(
        "ambiguous configuration: {} distinct changes on remote '{remote}' ({}); \
         configure distinct remote names so only one change is relevant",
        .branches.len(),
        .branches.join(", ")
    )]
    AmbiguousConfiguration {
        remote: String,
        branches: Vec<String>,
    },

    /// The job configuration cannot be integrated safely. Detected before any
    /// repository mutation.
    #[error("unsupported configuration: {reason}")]
    UnsupportedConfiguration { reason: String },

    /// A merge, rebase, commit or push failed, or the engine refused the
    /// result. The local clone may hold partial state; nothing was pushed
    /// unless the step is `DeleteBranch`.
    #[error("integration failed during {step}: {context}")]
    IntegrationFailed {
        step: Step,
        context: String,
        #[source]
        source: Option<GitError>,
    },

    /// Counting or walking commits failed.
    #[error("integration failed unexpectedly during {step}: {context}")]
    IntegrationUnknownFailure {
        step: Step,
        context: String,
        #[source]
        source: GitError,
    },
}

impl IntegrationError {
    pub fn unsupported(reason: impl Into<String>) -> Self {
        IntegrationError::UnsupportedConfiguration {
            reason: reason.into(),
        }
    }

    /// A failure detected by the engine itself, with no underlying git error.
    pub fn refused(step: Step, context: impl Into<String>) -> Self {
        IntegrationError::IntegrationFailed {
            step,
            context: context.into(),
            source: None,
        }
    }

    pub fn failed(step: Step, context: impl Into<String>, source: GitError) -> Self {
        IntegrationError::IntegrationFailed {
            step,
            context: context.into(),
            source: Some(source),
        }
    }

    pub fn unknown(step: Step, context: impl Into<String>, source: GitError) -> Self {
        IntegrationError::IntegrationUnknownFailure {
            step,
            context: context.into(),
            source,
        }
    }

    /// The step that failed, if the failure happened while running one.
    pub fn step(&self) -> Option<Step> {
        match self {
            IntegrationError::AmbiguousConfiguration { .. } => Some(Step::ResolveChange),
            IntegrationError::UnsupportedConfiguration { .. } => Some(Step::ValidateConfig),
            IntegrationError::IntegrationFailed { step, .. }
            | IntegrationError::IntegrationUnknownFailure { step, .. } => Some(*step),
        }
    }

    /// Message including the underlying git error, for user-facing diagnostics.
    pub fn diagnostic(&self) -> String {
        let mut message = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(err) = source {
            message.push_str("\ncaused by: ");
            message.push_str(&err.to_string());
            source = err.source();
        }
        message
    }
}

/// Result of an operation that may find nothing to do.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum Outcome<T> {
    Completed(T),
    /// Nothing relevant to integrate; maps to a neutral "not built" result.
    NothingToDo { reason: String },
}

impl<T> Outcome<T> {
    pub fn nothing_to_do(reason: impl Into<String>) -> Self {
        Outcome::NothingToDo {
            reason: reason.into(),
        }
    }

    pub fn is_nothing_to_do(&self) -> bool {
        matches!(self, Outcome::NothingToDo { .. })
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Completed(value) => Outcome::Completed(f(value)),
            Outcome::NothingToDo { reason } => Outcome::NothingToDo { reason },
        }
    }

    pub fn completed(self) -> Option<T> {
        match self {
            Outcome::Completed(value) => Some(value),
            Outcome::NothingToDo { .. } => None,
        }
    }
}
