//! Walking the commit graph between a candidate and the integration branch,
//! and rendering the walked commits as an accumulated commit message.

use chrono::{DateTime, Utc};

use crate::error::{IntegrationError, Step};
use crate::git::Repository;
use crate::types::{Commit, Sha};

/// Commits reachable from `from` but not from `exclude_ancestors_of`, newest
/// first with no parent ever preceding one of its children.
pub fn commits_between(
    repo: &dyn Repository,
    from: &Sha,
    exclude_ancestors_of: &Sha,
) -> Result<Vec<Commit>, IntegrationError> {
    repo.walk(from, exclude_ancestors_of).map_err(|source| {
        IntegrationError::unknown(
            Step::CommitLog,
            format!(
                "walking commits from {} excluding {}",
                from.short(),
                exclude_ancestors_of.short()
            ),
            source,
        )
    })
}

/// Number of commits [`commits_between`] would return.
pub fn commit_count(
    repo: &dyn Repository,
    from: &Sha,
    exclude_ancestors_of: &Sha,
) -> Result<usize, IntegrationError> {
    repo.walk(from, exclude_ancestors_of)
        .map(|commits| commits.len())
        .map_err(|source| {
            IntegrationError::unknown(
                Step::CommitCount,
                format!(
                    "counting commits from {} excluding {}",
                    from.short(),
                    exclude_ancestors_of.short()
                ),
                source,
            )
        })
}

/// Commit message of an accumulated merge of `branch` (remote-qualified).
pub fn accumulated_message(branch: &str, commits: &[Commit]) -> String {
    format!(
        "Accumulated commit of the following from branch '{}':\n\n{}",
        branch,
        render_commit_log(commits)
    )
}

/// Renders commits in the order given, one block per commit:
///
/// ```text
/// commit <id>
/// Author: <name> <<email>>
/// Date: <date>
///
///     <message, indented>
///
/// ```
///
/// Dates are always rendered in UTC (`+0000`) in the C locale, so the output
/// does not depend on the author's offset or the host; `git log` would show
/// the author's own offset instead.
pub fn render_commit_log(commits: &[Commit]) -> String {
    let mut log = String::new();
    for commit in commits {
        log.push_str(&format!("commit {}\n", commit.id));
        log.push_str(&format!("Author: {}\n", commit.author));
        log.push_str(&format!("Date: {}\n\n", format_date(&commit.timestamp)));
        for line in commit.message.lines() {
            log.push_str("    ");
            log.push_str(line);
            log.push('\n');
        }
        log.push('\n');
    }
    log
}

fn format_date(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%a %b %-d %H:%M:%S %Y %z").to_string()
}
