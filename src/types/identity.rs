//! Author and committer identities.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// `Name <email>`, with the space before `<` optional.
static IDENTITY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*?) ?<([^<>]*)>$").expect("identity pattern is valid"));

/// A raw identity string did not match `Name <email>`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed identity {raw:?}: expected \"Name <email>\"")]
pub struct IdentityError {
    pub raw: String,
}

/// A person as recorded on a commit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

impl Identity {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Identity {
            name: name.into(),
            email: email.into(),
        }
    }

    /// Parses a raw `Name <email>` string.
    ///
    /// Surrounding whitespace is ignored. The name may be empty (`<email>`),
    /// the angle brackets may not.
    pub fn parse(raw: &str) -> Result<Self, IdentityError> {
        let trimmed = raw.trim();
        let captures = IDENTITY_PATTERN
            .captures(trimmed)
            .ok_or_else(|| IdentityError {
                raw: raw.to_string(),
            })?;
        Ok(Identity {
            name: captures[1].trim_end().to_string(),
            email: captures[2].to_string(),
        })
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}
