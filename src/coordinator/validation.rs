//! Configuration checks that run before the repository is touched.

use std::collections::HashSet;

use crate::error::IntegrationError;
use crate::types::{Branch, DEFAULT_REMOTE, IntegrationConfig, RemoteConfig, remove_remote_prefix};

/// Rejects configurations that cannot be integrated safely.
///
/// With several remotes every remote must be named, so that changes can be
/// attributed to one of them. When remotes are given, the integration remote
/// must be one of them; a single unnamed remote is called `origin`.
pub fn validate_config(
    config: &IntegrationConfig,
    remotes: &[RemoteConfig],
) -> Result<(), IntegrationError> {
    let branch = config.integration_branch.trim();
    if branch.is_empty() {
        return Err(IntegrationError::unsupported("no integration branch configured"));
    }
    if branch != config.integration_branch || branch.starts_with('-') || branch.contains(' ') {
        return Err(IntegrationError::unsupported(format!(
            "'{}' is not a valid integration branch name",
            config.integration_branch
        )));
    }
    if config.integration_remote.trim().is_empty() {
        return Err(IntegrationError::unsupported("no integration remote configured"));
    }

    if remotes.is_empty() {
        return Ok(());
    }

    let names: Vec<&str> = match remotes {
        [only] if only.name.is_empty() => vec![DEFAULT_REMOTE],
        _ => {
            if let Some(unnamed) = remotes.iter().find(|r| r.name.is_empty()) {
                return Err(IntegrationError::unsupported(format!(
                    "remote {} has no name; every remote must be named when several are configured",
                    unnamed.url
                )));
            }
            remotes.iter().map(|r| r.name.as_str()).collect()
        }
    };

    let mut seen = HashSet::new();
    if let Some(duplicate) = names.iter().find(|name| !seen.insert(**name)) {
        return Err(IntegrationError::unsupported(format!(
            "remote name '{}' is configured more than once",
            duplicate
        )));
    }

    if !names.contains(&config.integration_remote.as_str()) {
        return Err(IntegrationError::unsupported(format!(
            "integration remote '{}' is not among the configured remotes ({})",
            config.integration_remote,
            names.join(", ")
        )));
    }

    Ok(())
}

/// Rejects integrating the integration branch into itself.
pub fn ensure_not_integration_branch(
    config: &IntegrationConfig,
    candidate: &Branch,
) -> Result<(), IntegrationError> {
    let target = &config.integration_branch;
    if candidate.name == *target || remove_remote_prefix(&candidate.name) == target {
        return Err(IntegrationError::unsupported(format!(
            "{} is the integration branch and cannot be integrated into itself; \
             exclude it from the branches that trigger integration",
            candidate.name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Sha, StrategyKind};

    fn config() -> IntegrationConfig {
        IntegrationConfig::new("master", StrategyKind::Squash)
    }

    fn branch(name: &str) -> Branch {
        Branch::remote_tracking(name, Sha::new("a".repeat(40)))
    }

    #[test]
    fn no_remotes_is_accepted() {
        assert!(validate_config(&config(), &[]).is_ok());
    }

    #[test]
    fn single_unnamed_remote_is_origin() {
        let remotes = [RemoteConfig::new("", "https://example.org/repo.git")];
        assert!(validate_config(&config(), &remotes).is_ok());

        let elsewhere = config().with_remote("upstream");
        assert!(validate_config(&elsewhere, &remotes).is_err());
    }

    #[test]
    fn several_remotes_must_all_be_named() {
        let remotes = [
            RemoteConfig::new("origin", "https://example.org/a.git"),
            RemoteConfig::new("", "https://example.org/b.git"),
        ];

        let err = validate_config(&config(), &remotes).unwrap_err();

        assert!(err.to_string().contains("https://example.org/b.git has no name"));
    }

    #[test]
    fn duplicate_remote_names_are_rejected() {
        let remotes = [
            RemoteConfig::new("origin", "https://example.org/a.git"),
            RemoteConfig::new("origin", "https://example.org/b.git"),
        ];

        let err = validate_config(&config(), &remotes).unwrap_err();

        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn integration_remote_must_be_configured() {
        let remotes = [
            RemoteConfig::new("fork", "https://example.org/a.git"),
            RemoteConfig::new("mirror", "https://example.org/b.git"),
        ];

        let err = validate_config(&config(), &remotes).unwrap_err();

        assert!(matches!(err, IntegrationError::UnsupportedConfiguration { .. }));
        assert!(err.to_string().contains("(fork, mirror)"));
    }

    #[test]
    fn blank_branch_is_rejected() {
        let blank = IntegrationConfig::new("  ", StrategyKind::Squash);
        assert!(validate_config(&blank, &[]).is_err());
    }

    #[test]
    fn integration_branch_cannot_integrate_itself() {
        assert!(ensure_not_integration_branch(&config(), &branch("origin/master")).is_err());
        assert!(ensure_not_integration_branch(&config(), &Branch::local("master", Sha::new("a".repeat(40)))).is_err());
        assert!(ensure_not_integration_branch(&config(), &branch("origin/ready/master")).is_ok());
        assert!(ensure_not_integration_branch(&config(), &branch("origin/ready/x")).is_ok());
    }
}
