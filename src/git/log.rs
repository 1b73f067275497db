//! Reading commits out of `git log`.
//!
//! Records are NUL-terminated (`-z`), fields are separated by the ASCII unit
//! separator so that arbitrary commit messages survive intact.

use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};

use crate::types::{Commit, Identity, Sha};

use super::{GitError, GitResult, run_git_sync};

const FIELD_SEPARATOR: char = '\x1f';

/// `--format` producing: id, parents, author, committer, author time, raw body.
pub(crate) const LOG_FORMAT: &str = "--format=%H%x1f%P%x1f%an <%ae>%x1f%cn <%ce>%x1f%at%x1f%B";

/// Commits reachable from `from` and not from `exclude_ancestors_of`.
///
/// `--date-order` never shows a parent before all of its children and
/// otherwise orders by commit time, newest first.
pub fn log_between(workdir: &Path, from: &Sha, exclude_ancestors_of: &Sha) -> GitResult<Vec<Commit>> {
    let boundary = format!("^{}", exclude_ancestors_of);
    let output = run_git_sync(
        workdir,
        &[
            "log",
            "-z",
            "--date-order",
            LOG_FORMAT,
            from.as_str(),
            &boundary,
            "--",
        ],
    )?;
    parse_log(&String::from_utf8_lossy(&output.stdout))
}

/// A single commit.
pub fn show_commit(workdir: &Path, id: &Sha) -> GitResult<Commit> {
    let output = run_git_sync(
        workdir,
        &["log", "-z", "-1", LOG_FORMAT, id.as_str(), "--"],
    )?;
    parse_log(&String::from_utf8_lossy(&output.stdout))?
        .into_iter()
        .next()
        .ok_or_else(|| GitError::RefNotFound {
            refspec: id.to_string(),
        })
}

/// Parses the output of `git log -z` with [`LOG_FORMAT`].
pub fn parse_log(output: &str) -> GitResult<Vec<Commit>> {
    output
        .split('\0')
        .map(|record| record.trim_start_matches('\n'))
        .filter(|record| !record.is_empty())
        .map(parse_record)
        .collect()
}

fn parse_record(record: &str) -> GitResult<Commit> {
    let fields: Vec<&str> = record.splitn(6, FIELD_SEPARATOR).collect();
    let [id, parents, author, committer, time, message] = fields[..] else {
        return Err(GitError::MalformedLog {
            details: format!("expected 6 fields, got {}: {:?}", fields.len(), record),
        });
    };

    let parents = parents
        .split_whitespace()
        .map(Sha::parse)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Commit {
        id: Sha::parse(id)?,
        parents,
        author: Identity::parse(author)?,
        committer: Identity::parse(committer)?,
        timestamp: parse_unix_time(time)?,
        message: message.trim_end_matches('\n').to_string(),
    })
}

fn parse_unix_time(raw: &str) -> GitResult<DateTime<Utc>> {
    let secs: i64 = raw.trim().parse().map_err(|_| GitError::MalformedLog {
        details: format!("bad timestamp {:?}", raw),
    })?;
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| GitError::MalformedLog {
            details: format!("timestamp out of range: {}", secs),
        })
}
