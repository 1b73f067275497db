//! Per-attempt integration configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default name of the remote that carries both the candidate and the
/// integration branch.
pub const DEFAULT_REMOTE: &str = "origin";

fn default_remote() -> String {
    DEFAULT_REMOTE.to_string()
}

/// How a candidate branch lands on the integration branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Only a single-commit fast-forward is accepted.
    FastForwardOnly,
    /// Fast-forward, else single-commit rebase, else one squashed commit.
    Squash,
    /// Fast-forward, else an explicit merge commit listing every integrated commit.
    Accumulated,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::FastForwardOnly => "fast_forward_only",
            StrategyKind::Squash => "squash",
            StrategyKind::Accumulated => "accumulated",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} {value:?}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl FromStr for StrategyKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "fast_forward_only" | "ff_only" => Ok(StrategyKind::FastForwardOnly),
            "squash" => Ok(StrategyKind::Squash),
            "accumulated" => Ok(StrategyKind::Accumulated),
            _ => Err(UnknownVariant {
                kind: "strategy",
                value: s.to_string(),
            }),
        }
    }
}

/// Result of the host's build, best first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildResult {
    #[default]
    Success,
    Unstable,
    Failure,
    NotBuilt,
    Aborted,
}

impl BuildResult {
    fn rank(self) -> u8 {
        match self {
            BuildResult::Success => 0,
            BuildResult::Unstable => 1,
            BuildResult::Failure => 2,
            BuildResult::NotBuilt => 3,
            BuildResult::Aborted => 4,
        }
    }

    /// Returns true if this result is at least as good as `threshold`.
    pub fn is_better_or_equal(self, threshold: BuildResult) -> bool {
        self.rank() <= threshold.rank()
    }
}

impl fmt::Display for BuildResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BuildResult::Success => "success",
            BuildResult::Unstable => "unstable",
            BuildResult::Failure => "failure",
            BuildResult::NotBuilt => "not_built",
            BuildResult::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

impl FromStr for BuildResult {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "success" => Ok(BuildResult::Success),
            "unstable" => Ok(BuildResult::Unstable),
            "failure" => Ok(BuildResult::Failure),
            "not_built" => Ok(BuildResult::NotBuilt),
            "aborted" => Ok(BuildResult::Aborted),
            _ => Err(UnknownVariant {
                kind: "build result",
                value: s.to_string(),
            }),
        }
    }
}

/// Configuration for a single integration attempt.
///
/// Branch and remote names are expected to be fully expanded by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationConfig {
    /// The shared branch receiving verified changes, e.g. `master`.
    pub integration_branch: String,
    #[serde(default = "default_remote")]
    pub integration_remote: String,
    pub strategy: StrategyKind,
}

impl IntegrationConfig {
    pub fn new(integration_branch: impl Into<String>, strategy: StrategyKind) -> Self {
        IntegrationConfig {
            integration_branch: integration_branch.into(),
            integration_remote: default_remote(),
            strategy,
        }
    }

    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.integration_remote = remote.into();
        self
    }

    /// `<remote>/<integration branch>`, the remote-tracking name of the target.
    pub fn remote_integration_branch(&self) -> String {
        format!("{}/{}", self.integration_remote, self.integration_branch)
    }
}
