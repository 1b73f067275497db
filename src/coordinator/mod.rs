//! Orchestration of one integration attempt.
//!
//! An attempt runs in two phases around the host's build:
//!
//! 1. [`Coordinator::prepare`] validates the configuration, resolves the one
//!    relevant change, takes the build queue, checks out the integration
//!    branch at its remote tip and runs the configured strategy. The result
//!    is committed locally but not pushed.
//! 2. [`Coordinator::publish`] pushes the integration branch and deletes the
//!    integrated branch, but only if the build result meets the required
//!    threshold. Otherwise the local integration is discarded.
//!
//! The queue permit is held from the checkout until `publish` finishes (or
//! the prepared integration is dropped), so concurrent attempts never
//! interleave their repository operations. [`Coordinator::integrate`] runs
//! both phases with a build callback in between.
//!
//! Any failure after the checkout resets the local integration branch to its
//! remote tip. Nothing is rolled back once pushed.

mod report;
mod validation;

use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use crate::error::{IntegrationError, Outcome, Step};
use crate::git::{GitError, PushResult, Repository};
use crate::queue::{BuildQueue, QueuePermit};
use crate::resolve::resolve;
use crate::strategy::{Integration, IntegrationContext, StepTrail, strategy_for};
use crate::types::{
    Branch, BuildResult, ChangeDescriptor, IntegrationConfig, RemoteConfig, Sha, StrategyKind,
};

pub use report::{BuildOutcome, IntegrationMethod, IntegrationReport};
pub use validation::{ensure_not_integration_branch, validate_config};

/// Everything needed for one integration attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationRequest {
    #[serde(flatten)]
    pub config: IntegrationConfig,
    /// Remotes configured for the job; empty when unknown.
    #[serde(default)]
    pub remotes: Vec<RemoteConfig>,
    /// Changes observed by the trigger, across all remotes.
    #[serde(default)]
    pub changes: Vec<ChangeDescriptor>,
    /// Worst build result that still publishes the integration.
    #[serde(default)]
    pub required_result: BuildResult,
}

/// An integration committed locally and waiting for its build result.
///
/// Holds the build queue until published or dropped.
#[derive(Debug)]
pub struct PreparedIntegration<'q> {
    _permit: QueuePermit<'q>,
    config: IntegrationConfig,
    required_result: BuildResult,
    change: ChangeDescriptor,
    base: Sha,
    head: Sha,
    method: IntegrationMethod,
    trail: StepTrail,
}

impl PreparedIntegration<'_> {
    pub fn config(&self) -> &IntegrationConfig {
        &self.config
    }

    /// The change being integrated.
    pub fn change(&self) -> &ChangeDescriptor {
        &self.change
    }

    /// Remote tip of the integration branch the attempt started from.
    pub fn base(&self) -> &Sha {
        &self.base
    }

    /// Local head of the integration branch, to be built and published.
    pub fn head(&self) -> &Sha {
        &self.head
    }

    pub fn method(&self) -> IntegrationMethod {
        self.method
    }

    pub fn trail(&self) -> &StepTrail {
        &self.trail
    }
}

/// Result of [`Coordinator::publish`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Publication {
    /// Pushed, and the integrated branch deleted from the remote.
    Published { head: Sha, deleted_branch: String },
    /// The build result was worse than required; nothing was pushed.
    Withheld {
        build_result: BuildResult,
        required: BuildResult,
    },
}

/// Runs integration attempts against one working clone.
pub struct Coordinator<'a> {
    repo: &'a dyn Repository,
    queue: &'a BuildQueue,
}

impl<'a> Coordinator<'a> {
    pub fn new(repo: &'a dyn Repository, queue: &'a BuildQueue) -> Self {
        Coordinator { repo, queue }
    }

    /// Integrates the relevant change locally, without publishing it.
    #[instrument(skip_all, fields(branch = %request.config.integration_branch, strategy = %request.config.strategy))]
    pub fn prepare(
        &self,
        request: &IntegrationRequest,
    ) -> Result<Outcome<PreparedIntegration<'a>>, IntegrationError> {
        self.prepare_with(request, &mut StepTrail::default())
    }

    /// Publishes a prepared integration if `build_result` meets the required
    /// result, and releases the build queue.
    #[instrument(skip_all, fields(branch = %prepared.config.integration_branch, head = %prepared.head.short(), build = %build_result))]
    pub fn publish(
        &self,
        mut prepared: PreparedIntegration<'a>,
        build_result: BuildResult,
    ) -> Result<Publication, IntegrationError> {
        let mut trail = std::mem::take(&mut prepared.trail);
        self.publish_with(prepared, build_result, &mut trail)
    }

    /// Prepares, builds and publishes in one go.
    ///
    /// `build` runs while the queue is held, with the integrated head checked
    /// out, and decides whether the integration gets published.
    #[instrument(skip_all, fields(branch = %request.config.integration_branch, strategy = %request.config.strategy))]
    pub fn integrate<F>(&self, request: &IntegrationRequest, build: F) -> IntegrationReport
    where
        F: FnOnce(&PreparedIntegration<'a>) -> BuildResult,
    {
        let mut trail = StepTrail::default();
        let mut prepared = match self.prepare_with(request, &mut trail) {
            Ok(Outcome::Completed(prepared)) => prepared,
            Ok(Outcome::NothingToDo { reason }) => {
                info!(%reason, "Nothing to integrate");
                return IntegrationReport::not_built(reason, trail);
            }
            Err(err) => {
                warn!(error = %err, "Integration failed");
                return IntegrationReport::failed(&err, trail);
            }
        };

        let build_result = build(&prepared);
        let mut trail = std::mem::take(&mut prepared.trail);
        let candidate = prepared.change.triggering_branch.name.clone();
        let revision = prepared.change.revision.clone();
        let method = prepared.method;
        let head = prepared.head.clone();

        let mut report = match self.publish_with(prepared, build_result, &mut trail) {
            Ok(Publication::Published {
                head,
                deleted_branch,
            }) => {
                let mut report = IntegrationReport::integrated(
                    format!("{} integrated as {}", candidate, head.short()),
                    trail,
                );
                report.pushed = true;
                report.deleted_branch = Some(deleted_branch);
                report
            }
            Ok(Publication::Withheld {
                build_result,
                required,
            }) => {
                let mut steps = trail;
                steps.failed(
                    Step::Push,
                    format!("build result {} is worse than {}", build_result, required),
                );
                IntegrationReport {
                    outcome: BuildOutcome::Failed,
                    ..IntegrationReport::not_built(
                        format!(
                            "build result {} does not meet the required {}; {} was not integrated",
                            build_result, required, candidate
                        ),
                        steps,
                    )
                }
            }
            Err(err) => {
                let pushed = err.step() == Some(Step::DeleteBranch);
                let mut report = IntegrationReport::failed(&err, trail);
                report.pushed = pushed;
                report
            }
        };

        report.candidate = Some(candidate);
        report.revision = Some(revision);
        report.method = Some(method);
        report.integrated_commit = Some(head);
        report.build_result = Some(build_result);
        report
    }

    fn prepare_with(
        &self,
        request: &IntegrationRequest,
        trail: &mut StepTrail,
    ) -> Result<Outcome<PreparedIntegration<'a>>, IntegrationError> {
        let config = &request.config;
        validate_config(config, &request.remotes)?;
        trail.done(Step::ValidateConfig, format!("{} strategy", config.strategy));

        let change = match resolve(&request.changes, &config.integration_remote)? {
            Outcome::Completed(change) => change,
            Outcome::NothingToDo { reason } => {
                trail.skipped(Step::ResolveChange, &reason);
                return Ok(Outcome::NothingToDo { reason });
            }
        };
        ensure_not_integration_branch(config, &change.triggering_branch)?;
        trail.done(
            Step::ResolveChange,
            format!("{} at {}", change.triggering_branch, change.revision.short()),
        );

        let permit = self.queue.acquire();
        let target = config.remote_integration_branch();

        let (base, head, method) = match self.integrate_locally(config, &change, &target, trail) {
            Ok(Outcome::Completed(result)) => result,
            Ok(Outcome::NothingToDo { reason }) => {
                self.rollback(&target, trail);
                return Ok(Outcome::NothingToDo { reason });
            }
            Err(err) => {
                self.rollback(&target, trail);
                return Err(err);
            }
        };

        info!(
            candidate = %change.triggering_branch,
            base = %base.short(),
            head = %head.short(),
            ?method,
            "Prepared integration"
        );
        Ok(Outcome::Completed(PreparedIntegration {
            _permit: permit,
            config: config.clone(),
            required_result: request.required_result,
            change,
            base,
            head,
            method,
            trail: std::mem::take(trail),
        }))
    }

    /// Checks out the integration branch at `target` and runs the strategy.
    fn integrate_locally(
        &self,
        config: &IntegrationConfig,
        change: &ChangeDescriptor,
        target: &str,
        trail: &mut StepTrail,
    ) -> Result<Outcome<(Sha, Sha, IntegrationMethod)>, IntegrationError> {
        let checkout_failed = |source: GitError| {
            IntegrationError::failed(
                Step::Checkout,
                format!("checking out {} at {}", config.integration_branch, target),
                source,
            )
        };

        let base = self
            .repo
            .resolve_ref(target)
            .map_err(checkout_failed)?
            .ok_or_else(|| {
                checkout_failed(GitError::RefNotFound {
                    refspec: target.to_string(),
                })
            })?;
        self.repo.checkout(base.as_str()).map_err(checkout_failed)?;
        self.repo
            .create_branch(&config.integration_branch, &base)
            .map_err(checkout_failed)?;
        self.repo
            .checkout(&config.integration_branch)
            .map_err(checkout_failed)?;
        trail.done(
            Step::Checkout,
            format!("{} at {}", config.integration_branch, base.short()),
        );

        let candidate = Branch::remote_tracking(
            change.triggering_branch.name.clone(),
            change.revision.clone(),
        );
        let ctx = IntegrationContext {
            candidate: &candidate,
            integration_branch: &config.integration_branch,
            integration_tip: &base,
        };

        let integration = match strategy_for(config.strategy).integrate(self.repo, &ctx, trail)? {
            Outcome::Completed(integration) => integration,
            Outcome::NothingToDo { reason } => return Ok(Outcome::NothingToDo { reason }),
        };

        let (head, method) = match integration {
            Integration::FastForwarded { head } => (head, IntegrationMethod::FastForward),
            Integration::Rebased { head } => (head, IntegrationMethod::Rebase),
            Integration::Staged { message, author } => {
                let head = self.repo.commit(&message, &author).map_err(|source| {
                    IntegrationError::failed(
                        Step::Commit,
                        format!("committing integration of {}", candidate),
                        source,
                    )
                })?;
                trail.done(Step::Commit, format!("{} by {}", head.short(), author));
                let method = match config.strategy {
                    StrategyKind::Accumulated => IntegrationMethod::Merge,
                    _ => IntegrationMethod::Squash,
                };
                (head, method)
            }
        };

        Ok(Outcome::Completed((base, head, method)))
    }

    fn publish_with(
        &self,
        prepared: PreparedIntegration<'a>,
        build_result: BuildResult,
        trail: &mut StepTrail,
    ) -> Result<Publication, IntegrationError> {
        let PreparedIntegration {
            _permit,
            config,
            required_result,
            change,
            head,
            ..
        } = prepared;
        let remote = &config.integration_remote;
        let branch = &config.integration_branch;
        let target = config.remote_integration_branch();

        if !build_result.is_better_or_equal(required_result) {
            info!(%build_result, required = %required_result, "Build result too poor; discarding integration");
            self.rollback(&target, trail);
            return Ok(Publication::Withheld {
                build_result,
                required: required_result,
            });
        }

        let push_failed = |source: GitError| {
            IntegrationError::failed(
                Step::Push,
                format!("pushing {} to {}", branch, remote),
                source,
            )
        };
        let pushed = match self.repo.push(remote, branch) {
            Ok(PushResult::Success { .. } | PushResult::AlreadyUpToDate) => Ok(()),
            Ok(PushResult::Rejected { details }) => {
                Err(push_failed(GitError::PushRejected { details }))
            }
            Err(source) => Err(push_failed(source)),
        };
        if let Err(err) = pushed {
            trail.failed(Step::Push, err.to_string());
            self.rollback(&target, trail);
            return Err(err);
        }
        trail.done(Step::Push, format!("{} pushed to {}/{}", head.short(), remote, branch));

        let integrated = change.triggering_branch.short_name().to_string();
        if let Err(source) = self.repo.delete_remote_branch(remote, &integrated) {
            error!(branch = %integrated, error = %source, "Failed to delete integrated branch");
            let err = IntegrationError::failed(
                Step::DeleteBranch,
                format!(
                    "{} was published at {} but deleting {}/{} failed",
                    branch,
                    head.short(),
                    remote,
                    integrated
                ),
                source,
            );
            trail.failed(Step::DeleteBranch, err.to_string());
            return Err(err);
        }
        trail.done(Step::DeleteBranch, format!("deleted {}/{}", remote, integrated));

        info!(head = %head.short(), deleted = %integrated, "Published integration");
        Ok(Publication::Published {
            head,
            deleted_branch: integrated,
        })
    }

    /// Resets the integration branch to its remote tip. Failures are logged
    /// and recorded, never raised.
    fn rollback(&self, target: &str, trail: &mut StepTrail) {
        match self.repo.reset_hard(target) {
            Ok(()) => {
                info!(target, "Rolled back local integration branch");
                trail.done(Step::Rollback, format!("reset to {}", target));
            }
            Err(err) => {
                warn!(target, error = %err, "Rollback failed");
                trail.failed(Step::Rollback, err.to_string());
            }
        }
    }
}

#[cfg(test)]
mod property_tests;
