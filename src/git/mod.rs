//! Repository adapter: the VCS primitives the integration engine is built on.
//!
//! The engine only talks to the [`Repository`] trait. [`GitCli`] implements it
//! by driving the `git` binary in a working clone:
//! - Ref resolution and branch listing
//! - Fast-forward, squash and no-fast-forward merges (squash and no-ff stop
//!   before committing so the caller controls author and message)
//! - Single-commit rebase
//! - Commit, push and remote branch deletion
//! - Commit graph walks (`git log <from> ^<boundary>`)
//!
//! Conflicted merges and rebases are aborted before returning, so a
//! `Conflict` result never leaves the working tree mid-merge.

pub mod cli;
pub mod log;
pub mod merge;
pub mod push;
pub mod recovery;

use std::path::Path;
use std::process::Output;

use thiserror::Error;

use crate::types::{Branch, Commit, Identity, IdentityError, InvalidSha, Sha};

pub use cli::GitCli;
pub use push::PushResult;

/// Errors from git operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// Git command failed.
    #[error("git command failed: {command}\nstderr: {stderr}")]
    CommandFailed { command: String, stderr: String },

    /// Merge or rebase stopped on conflicts.
    #[error("merge conflict: {details}")]
    MergeConflict { details: String },

    /// Push was rejected (non-fast-forward).
    #[error("push rejected: {details}")]
    PushRejected { details: String },

    /// Ref not found.
    #[error("ref not found: {refspec}")]
    RefNotFound { refspec: String },

    /// Git printed something that is not a commit id.
    #[error(transparent)]
    InvalidSha(#[from] InvalidSha),

    /// An author or committer line did not parse.
    #[error(transparent)]
    MalformedIdentity(#[from] IdentityError),

    /// `git log` output did not have the expected shape.
    #[error("unexpected log output: {details}")]
    MalformedLog { details: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for git operations.
pub type GitResult<T> = Result<T, GitError>;

/// Result of a merge operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeResult {
    /// The branch pointer moved forward to `commit_sha` without a merge commit.
    FastForwarded {
        /// The new tip of the checked-out branch.
        commit_sha: Sha,
    },

    /// The merge result is staged in the index, waiting for a commit.
    Staged,

    /// A fast-forward was requested but the histories have diverged.
    NotFastForward,

    /// Merge resulted in a conflict (already aborted).
    Conflict {
        /// Files with conflicts.
        conflicting_files: Vec<String>,
    },

    /// Merge was a no-op (already up-to-date).
    AlreadyUpToDate,
}

/// Result of `git merge --squash`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SquashResult {
    /// Changes are staged. `message` is the squash preview git prepared, or
    /// `None` when nothing ended up staged.
    Staged { message: Option<String> },

    /// Squash stopped on conflicts (already cleaned up).
    Conflict { conflicting_files: Vec<String> },
}

/// Result of rebasing a commit onto a branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebaseResult {
    /// HEAD is detached at the rebased commit.
    Rebased { head: Sha },

    /// Rebase stopped on conflicts (already aborted).
    Conflict { conflicting_files: Vec<String> },
}

/// The VCS operations the integration engine needs.
///
/// All operations are synchronous and act on a single working clone. Branch
/// arguments are short names (`master`, `origin/ready/x`), commit arguments
/// are resolved ids.
pub trait Repository {
    /// Resolves a ref or revision to a commit id. `Ok(None)` if it does not exist.
    fn resolve_ref(&self, name: &str) -> GitResult<Option<Sha>>;

    /// Reads a single commit.
    fn find_commit(&self, id: &Sha) -> GitResult<Commit>;

    /// Local branches.
    fn list_branches(&self) -> GitResult<Vec<Branch>>;

    /// Remote-tracking branches, named `<remote>/<branch>`.
    fn list_remote_branches(&self) -> GitResult<Vec<Branch>>;

    /// Checks out a branch, or detaches HEAD at any other revision.
    fn checkout(&self, target: &str) -> GitResult<()>;

    /// Creates `name` at `at`, resetting it if it already exists.
    fn create_branch(&self, name: &str, at: &Sha) -> GitResult<()>;

    /// `git merge --ff-only`.
    fn merge_fast_forward_only(&self, commit: &Sha) -> GitResult<MergeResult>;

    /// `git merge --squash`; stages the result without committing.
    fn merge_squash(&self, commit: &Sha) -> GitResult<SquashResult>;

    /// `git merge --no-ff --no-commit`; stages a merge of `commit` whose
    /// commit will carry `message` and `author`.
    fn merge_no_fast_forward(
        &self,
        commit: &Sha,
        message: &str,
        author: &Identity,
    ) -> GitResult<MergeResult>;

    /// Replays `commit` onto the tip of `onto`, leaving HEAD detached at the result.
    fn rebase(&self, commit: &Sha, onto: &str) -> GitResult<RebaseResult>;

    /// Commits the index (including an in-progress merge) with the given author.
    fn commit(&self, message: &str, author: &Identity) -> GitResult<Sha>;

    /// Pushes local `branch` to the same name on `remote`.
    fn push(&self, remote: &str, branch: &str) -> GitResult<PushResult>;

    /// Deletes `branch` (short name, without remote prefix) on `remote`.
    fn delete_remote_branch(&self, remote: &str, branch: &str) -> GitResult<()>;

    /// Commits reachable from `from` but not from `exclude_ancestors_of`,
    /// newest first.
    fn walk(&self, from: &Sha, exclude_ancestors_of: &Sha) -> GitResult<Vec<Commit>>;

    /// Returns true if `id` introduces no change relative to its first parent.
    fn is_empty_commit(&self, id: &Sha) -> GitResult<bool>;

    /// Abandons any in-progress merge or rebase and hard-resets the checked-out
    /// branch to `target`.
    fn reset_hard(&self, target: &str) -> GitResult<()>;
}

/// Identity used for creating commits.
///
/// This is passed via `-c` flags to git commands, ensuring commits can be
/// created even when global/system git config is disabled. Authors of
/// synthesized commits are set separately; this is the committer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitIdentity {
    /// The committer name (git `user.name`).
    pub name: String,

    /// The committer email (git `user.email`).
    pub email: String,

    /// GPG signing key ID. If present, commits will be signed with `-S`
    /// and this key will be used via `-c user.signingkey=<key>`.
    pub signing_key: Option<String>,
}

impl CommitIdentity {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        CommitIdentity {
            name: name.into(),
            email: email.into(),
            signing_key: None,
        }
    }
}

impl From<Identity> for CommitIdentity {
    fn from(identity: Identity) -> Self {
        CommitIdentity::new(identity.name, identity.email)
    }
}

/// Create a git Command with clean environment (no system/user config).
///
/// This ensures consistent behavior across different machines by ignoring
/// system and user git configuration (e.g., rerere, hooks, aliases).
pub(crate) fn git_command(workdir: &Path) -> std::process::Command {
    use std::process::Command;

    let mut cmd = Command::new("git");
    cmd.current_dir(workdir);

    // Disable system and user config for reproducible behavior
    cmd.env("GIT_CONFIG_NOSYSTEM", "1");
    cmd.env("GIT_CONFIG_GLOBAL", "/dev/null");

    // Disable terminal prompts and editors
    cmd.env("GIT_TERMINAL_PROMPT", "0");
    cmd.env("GIT_EDITOR", "true");

    // Fixed locale so output matching is stable
    cmd.env("LC_ALL", "C");

    cmd
}

/// Create a git Command configured for commit operations.
///
/// This extends [`git_command`] with identity configuration passed via `-c` flags:
/// - `-c user.name=<name>`
/// - `-c user.email=<email>`
/// - If `identity.signing_key` is Some: `-c user.signingkey=<key>`
///
/// Callers should use `-S` to actually sign commits when `identity.signing_key` is set.
pub(crate) fn git_commit_command(
    workdir: &Path,
    identity: &CommitIdentity,
) -> std::process::Command {
    let mut cmd = git_command(workdir);

    cmd.arg("-c");
    cmd.arg(format!("user.name={}", identity.name));
    cmd.arg("-c");
    cmd.arg(format!("user.email={}", identity.email));

    if let Some(ref key) = identity.signing_key {
        cmd.arg("-c");
        cmd.arg(format!("user.signingkey={}", key));
    }

    cmd
}

/// Run a git command in the given working directory.
///
/// Returns the command output on success, or a GitError on failure.
pub fn run_git_sync(workdir: &Path, args: &[&str]) -> GitResult<Output> {
    let output = git_command(workdir).args(args).output()?;
    check_status(output, args)
}

/// Run a git command and return stdout as a string.
pub fn run_git_stdout(workdir: &Path, args: &[&str]) -> GitResult<String> {
    let output = run_git_sync(workdir, args)?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn check_status(output: Output, args: &[&str]) -> GitResult<Output> {
    if output.status.success() {
        Ok(output)
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let command = format!("git {}", args.join(" "));
        Err(GitError::CommandFailed { command, stderr })
    }
}

/// Get the SHA of a revision.
pub fn rev_parse(workdir: &Path, rev: &str) -> GitResult<Sha> {
    let sha_str = run_git_stdout(workdir, &["rev-parse", rev])?;
    Ok(Sha::parse(&sha_str)?)
}

/// Get the tree SHA for a commit (useful for comparing content across commits).
pub fn get_tree_sha(workdir: &Path, commit: &str) -> GitResult<Sha> {
    let tree_str = run_git_stdout(workdir, &["rev-parse", &format!("{}^{{tree}}", commit)])?;
    Ok(Sha::parse(&tree_str)?)
}

/// Get the parent SHA(s) for a commit.
pub fn get_parents(workdir: &Path, commit: &str) -> GitResult<Vec<Sha>> {
    let output = run_git_stdout(workdir, &["rev-parse", &format!("{}^@", commit)])?;
    if output.is_empty() {
        return Ok(vec![]);
    }
    output
        .lines()
        .map(|line| Sha::parse(line).map_err(GitError::from))
        .collect()
}

/// Checkout a target in detached HEAD mode.
pub fn checkout_detached(workdir: &Path, target: &str) -> GitResult<()> {
    run_git_sync(workdir, &["checkout", "--quiet", "--detach", target])?;
    Ok(())
}
