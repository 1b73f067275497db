//! Working tree cleanup after failed or abandoned integration attempts.
//!
//! - **On conflict**: a merge, squash or rebase that stopped on conflicts
//!   leaves conflict markers in the index. It is abandoned immediately so
//!   subsequent checkouts succeed.
//!
//! - **On rollback**: when a strategy fails or the build does not meet the
//!   required result, the integration branch is hard-reset to its remote tip.
//!   This is a new corrective operation on the local clone; nothing that was
//!   already pushed is touched.

use std::path::Path;

use super::{GitResult, run_git_sync};

/// Abandon whatever merge, squash or rebase is in progress and restore HEAD.
///
/// Each abort is attempted unconditionally; git refuses the ones that do not
/// apply, which is fine.
pub fn abandon_in_progress(worktree: &Path) -> GitResult<()> {
    let _ = run_git_sync(worktree, &["rebase", "--abort"]);
    let _ = run_git_sync(worktree, &["merge", "--abort"]);

    // Squash merges have no MERGE_HEAD, so only a hard reset clears them
    run_git_sync(worktree, &["reset", "--quiet", "--hard", "HEAD"])?;
    run_git_sync(worktree, &["clean", "-fd", "--quiet"])?;

    Ok(())
}

/// Abandon in-progress work and hard-reset the checked-out branch to `target`.
pub fn reset_to(worktree: &Path, target: &str) -> GitResult<()> {
    abandon_in_progress(worktree)?;
    run_git_sync(worktree, &["reset", "--quiet", "--hard", target])?;
    Ok(())
}
