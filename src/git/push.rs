//! Push operations: publishing the integration branch and deleting the
//! integrated candidate branch.
//!
//! Pushes use explicit `refs/heads/<branch>:refs/heads/<branch>` refspecs so
//! a local branch never lands under a different name on the remote.

use std::path::Path;

use crate::types::Sha;

use super::{GitError, GitResult, rev_parse};

/// Result of a push operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushResult {
    /// Push succeeded.
    Success {
        /// The SHA that was pushed.
        pushed_sha: Sha,
    },

    /// Push was rejected (non-fast-forward).
    Rejected {
        /// Details about why the push was rejected.
        details: String,
    },

    /// Push was a no-op (remote already has this commit).
    AlreadyUpToDate,
}

/// Push local `branch` to the branch of the same name on `remote`.
pub fn push_branch(worktree: &Path, remote: &str, branch: &str) -> GitResult<PushResult> {
    let refspec = format!("refs/heads/{0}:refs/heads/{0}", branch);
    let branch_sha = rev_parse(worktree, &format!("refs/heads/{}", branch))?;

    let output = super::git_command(worktree)
        .args(["push", "--porcelain", remote, &refspec])
        .output()?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    if output.status.success() {
        // Porcelain marks up-to-date refs with '='
        if stdout.lines().any(|line| line.starts_with("=\t"))
            || stderr.contains("Everything up-to-date")
        {
            return Ok(PushResult::AlreadyUpToDate);
        }
        return Ok(PushResult::Success {
            pushed_sha: branch_sha,
        });
    }

    let combined = format!("{}{}", stdout, stderr);
    if combined.contains("non-fast-forward")
        || combined.contains("rejected")
        || combined.contains("failed to push")
    {
        return Ok(PushResult::Rejected {
            details: combined.trim().to_string(),
        });
    }

    Err(GitError::CommandFailed {
        command: format!("git push {} {}", remote, refspec),
        stderr: stderr.to_string(),
    })
}

/// Delete `branch` on `remote`. Also drops the matching remote-tracking ref.
///
/// Some transports only warn when the ref is already gone, so its presence is
/// checked first.
pub fn delete_remote_branch(worktree: &Path, remote: &str, branch: &str) -> GitResult<()> {
    if get_remote_ref(worktree, remote, branch)?.is_none() {
        return Err(GitError::RefNotFound {
            refspec: format!("{}/{}", remote, branch),
        });
    }

    let refspec = format!(":refs/heads/{}", branch);
    let output = super::git_command(worktree)
        .args(["push", remote, &refspec])
        .output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        if stderr.contains("remote ref does not exist") {
            return Err(GitError::RefNotFound {
                refspec: format!("{}/{}", remote, branch),
            });
        }
        return Err(GitError::CommandFailed {
            command: format!("git push {} {}", remote, refspec),
            stderr,
        });
    }

    Ok(())
}

/// Get the remote ref SHA for a branch.
///
/// Returns `None` if the branch doesn't exist on the remote.
fn get_remote_ref(worktree: &Path, remote: &str, branch: &str) -> GitResult<Option<Sha>> {
    let output = super::git_command(worktree)
        .args(["ls-remote", remote, &format!("refs/heads/{}", branch)])
        .output()?;

    if !output.status.success() {
        return Err(GitError::CommandFailed {
            command: format!("git ls-remote {} refs/heads/{}", remote, branch),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let line = stdout.trim();

    if line.is_empty() {
        return Ok(None);
    }

    // Format: "SHA\trefs/heads/branch"
    let sha_str = line.split('\t').next().unwrap_or("");
    Ok(Some(Sha::parse(sha_str)?))
}
