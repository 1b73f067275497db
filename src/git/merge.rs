//! Merge and rebase operations on the checked-out integration branch.
//!
//! 1. **Fast-forward** (`merge_fast_forward_only`): advance the branch pointer,
//!    never create a commit.
//!
//! 2. **Squash** (`merge_squash`): stage the combined change of a branch and
//!    return git's squash preview message (`SQUASH_MSG`).
//!
//! 3. **No-fast-forward** (`merge_no_fast_forward`): stage an explicit merge
//!    that will always produce a merge commit.
//!
//! 4. **Rebase** (`rebase_commit`): replay one commit onto a branch tip in
//!    detached HEAD mode.
//!
//! Squash and no-fast-forward merges stop before committing; the caller commits
//! with the author of the integrated work. Every conflict is cleaned up before
//! returning.

use std::path::Path;

use crate::types::{Identity, Sha};

use super::recovery::abandon_in_progress;
use super::{
    CommitIdentity, GitError, GitResult, MergeResult, RebaseResult, SquashResult,
    checkout_detached, git_commit_command, rev_parse, run_git_stdout,
};

/// `git merge --ff-only <commit>` on the checked-out branch.
pub fn merge_fast_forward_only(worktree: &Path, commit: &Sha) -> GitResult<MergeResult> {
    let args = ["merge", "--ff-only", commit.as_str()];
    let output = super::git_command(worktree).args(args).output()?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    if output.status.success() {
        if stdout.contains("Already up to date") {
            return Ok(MergeResult::AlreadyUpToDate);
        }
        let commit_sha = rev_parse(worktree, "HEAD")?;
        return Ok(MergeResult::FastForwarded { commit_sha });
    }

    // git < 2.33 says "Not possible to fast-forward", newer releases
    // "Not possible to fast-forward, aborting." or "diverging branches"
    if stderr.contains("Not possible to fast-forward") || stderr.contains("diverg") {
        return Ok(MergeResult::NotFastForward);
    }

    Err(GitError::CommandFailed {
        command: format!("git {}", args.join(" ")),
        stderr: stderr.to_string(),
    })
}

/// `git merge --squash <commit>`: stage the branch's net change without committing.
///
/// Returns the squash preview message git wrote to `SQUASH_MSG`, or `None`
/// when nothing ended up staged: the commit is already contained in HEAD, or
/// its changes already landed through other commits. Squashing onto a
/// diverged branch runs a real merge, so the committer identity is required.
pub fn merge_squash(
    worktree: &Path,
    commit: &Sha,
    identity: &CommitIdentity,
) -> GitResult<SquashResult> {
    let args = ["merge", "--squash", commit.as_str()];
    let output = git_commit_command(worktree, identity).args(args).output()?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    if output.status.success() {
        if stdout.contains("Already up to date") {
            return Ok(SquashResult::Staged { message: None });
        }
        if !has_staged_changes(worktree)? {
            abandon_in_progress(worktree)?;
            return Ok(SquashResult::Staged { message: None });
        }
        let message = read_squash_message(worktree)?;
        return Ok(SquashResult::Staged { message });
    }

    let combined = format!("{}{}", stdout, stderr);
    if combined.contains("CONFLICT") || combined.contains("Automatic merge failed") {
        let conflicting_files = get_conflicting_files(worktree)?;
        abandon_in_progress(worktree)?;
        return Ok(SquashResult::Conflict { conflicting_files });
    }

    Err(GitError::CommandFailed {
        command: format!("git {}", args.join(" ")),
        stderr: stderr.to_string(),
    })
}

/// Whether the index differs from HEAD (`git diff --cached --quiet`).
fn has_staged_changes(worktree: &Path) -> GitResult<bool> {
    let args = ["diff", "--cached", "--quiet"];
    let output = super::git_command(worktree).args(args).output()?;
    match output.status.code() {
        Some(0) => Ok(false),
        Some(1) => Ok(true),
        _ => Err(GitError::CommandFailed {
            command: format!("git {}", args.join(" ")),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        }),
    }
}

/// `git merge --no-ff --no-commit -m <message> <commit>`.
///
/// The author is exported to the merge process as well; the final commit
/// must still be created with [`commit_staged`].
pub fn merge_no_fast_forward(
    worktree: &Path,
    commit: &Sha,
    message: &str,
    author: &Identity,
    identity: &CommitIdentity,
) -> GitResult<MergeResult> {
    let args = [
        "merge",
        "--no-ff",
        "--no-commit",
        "-m",
        message,
        commit.as_str(),
    ];

    let output = git_commit_command(worktree, identity)
        .env("GIT_AUTHOR_NAME", &author.name)
        .env("GIT_AUTHOR_EMAIL", &author.email)
        .args(args)
        .output()?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    if output.status.success() {
        if stdout.contains("Already up to date") {
            return Ok(MergeResult::AlreadyUpToDate);
        }
        return Ok(MergeResult::Staged);
    }

    // Check for merge conflict (git outputs CONFLICT to stdout, not stderr)
    let combined = format!("{}{}", stdout, stderr);
    if combined.contains("CONFLICT") || combined.contains("Automatic merge failed") {
        let conflicting_files = get_conflicting_files(worktree)?;
        abandon_in_progress(worktree)?;
        return Ok(MergeResult::Conflict { conflicting_files });
    }

    Err(GitError::CommandFailed {
        command: format!("git merge --no-ff --no-commit {}", commit),
        stderr: stderr.to_string(),
    })
}

/// Rebase `commit` onto the tip of `onto`, leaving HEAD detached at the result.
pub fn rebase_commit(
    worktree: &Path,
    commit: &Sha,
    onto: &str,
    identity: &CommitIdentity,
) -> GitResult<RebaseResult> {
    checkout_detached(worktree, commit.as_str())?;

    let output = git_commit_command(worktree, identity)
        .args(["rebase", "--no-keep-empty", onto])
        .output()?;

    if output.status.success() {
        let head = rev_parse(worktree, "HEAD")?;
        return Ok(RebaseResult::Rebased { head });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let combined = format!("{}{}", stdout, stderr);
    if combined.contains("CONFLICT") || combined.contains("could not apply") {
        let conflicting_files = get_conflicting_files(worktree)?;
        abandon_in_progress(worktree)?;
        return Ok(RebaseResult::Conflict { conflicting_files });
    }

    // Leave no half-finished rebase behind whatever went wrong
    abandon_in_progress(worktree)?;
    Err(GitError::CommandFailed {
        command: format!("git rebase {}", onto),
        stderr: stderr.to_string(),
    })
}

/// Commit the index (including an in-progress merge) on behalf of `author`.
///
/// The message is used verbatim.
pub fn commit_staged(
    worktree: &Path,
    message: &str,
    author: &Identity,
    identity: &CommitIdentity,
) -> GitResult<Sha> {
    let author_arg = format!("--author={}", author);
    let mut args = vec![
        "commit",
        "--no-verify",
        "--cleanup=verbatim",
        author_arg.as_str(),
        "-m",
        message,
    ];

    if identity.signing_key.is_some() {
        args.push("-S");
    }

    let output = git_commit_command(worktree, identity)
        .args(&args)
        .output()?;

    if !output.status.success() {
        return Err(GitError::CommandFailed {
            command: format!("git commit {}", author_arg),
            stderr: format!(
                "{}{}",
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr)
            ),
        });
    }

    rev_parse(worktree, "HEAD")
}

/// Reads `SQUASH_MSG` from the git directory, if present.
fn read_squash_message(worktree: &Path) -> GitResult<Option<String>> {
    let path = run_git_stdout(worktree, &["rev-parse", "--git-path", "SQUASH_MSG"])?;
    let path = worktree.join(path);
    match std::fs::read_to_string(&path) {
        Ok(message) if message.trim().is_empty() => Ok(None),
        Ok(message) => Ok(Some(message)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Get the list of files with merge conflicts.
fn get_conflicting_files(worktree: &Path) -> GitResult<Vec<String>> {
    // git diff --name-only --diff-filter=U lists unmerged files
    match run_git_stdout(worktree, &["diff", "--name-only", "--diff-filter=U"]) {
        Ok(output) => Ok(output.lines().map(|s| s.to_string()).collect()),
        Err(_) => {
            // Fallback: try to get files from ls-files
            let output = run_git_stdout(worktree, &["ls-files", "-u"])?;
            let mut files: Vec<_> = output
                .lines()
                .filter_map(|line| line.split('\t').nth(1))
                .map(|s| s.to_string())
                .collect();
            files.dedup();
            Ok(files)
        }
    }
}
