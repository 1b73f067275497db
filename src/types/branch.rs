//! Branches, remotes and the change descriptors handed over by the trigger.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::Sha;

/// Strips exactly the first path segment of a remote-qualified branch name.
///
/// `origin/ready/feature` becomes `ready/feature`. A name without a `/` is
/// returned unchanged.
pub fn remove_remote_prefix(name: &str) -> &str {
    match name.split_once('/') {
        Some((_, rest)) => rest,
        None => name,
    }
}

/// A local or remote-tracking branch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Branch {
    /// Short name, e.g. `master` or `origin/ready/feature`.
    pub name: String,
    pub head: Sha,
    /// The remote this branch tracks, for remote-tracking branches.
    pub remote: Option<String>,
}

impl Branch {
    pub fn local(name: impl Into<String>, head: Sha) -> Self {
        Branch {
            name: name.into(),
            head,
            remote: None,
        }
    }

    /// A remote-tracking branch; the remote is the first path segment of `name`.
    pub fn remote_tracking(name: impl Into<String>, head: Sha) -> Self {
        let name = name.into();
        let remote = name.split_once('/').map(|(remote, _)| remote.to_string());
        Branch { name, head, remote }
    }

    /// Returns true if the name starts with `<remote>/`.
    pub fn is_qualified_by(&self, remote: &str) -> bool {
        self.name
            .strip_prefix(remote)
            .is_some_and(|rest| rest.starts_with('/'))
    }

    /// The branch name as seen on its remote (`ready/feature` for `origin/ready/feature`).
    pub fn short_name(&self) -> &str {
        if self.remote.is_some() {
            remove_remote_prefix(&self.name)
        } else {
            &self.name
        }
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A configured remote repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Remote name; empty when the host left the remote unnamed.
    #[serde(default)]
    pub name: String,
    pub url: String,
}

impl RemoteConfig {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        RemoteConfig {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// One observed change on one remote, as reported by the trigger subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeDescriptor {
    pub remote_name: String,
    pub triggering_branch: Branch,
    pub revision: Sha,
}

impl ChangeDescriptor {
    pub fn new(remote_name: impl Into<String>, triggering_branch: Branch, revision: Sha) -> Self {
        ChangeDescriptor {
            remote_name: remote_name.into(),
            triggering_branch,
            revision,
        }
    }
}
