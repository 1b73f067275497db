//! Commits as read from the repository.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Identity, Sha};

/// An immutable commit. The engine only ever reads these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub id: Sha,
    pub parents: Vec<Sha>,
    pub author: Identity,
    pub committer: Identity,
    /// Author timestamp, normalized to UTC.
    pub timestamp: DateTime<Utc>,
    /// Full commit message, including the body.
    pub message: String,
}
