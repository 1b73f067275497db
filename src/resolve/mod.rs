//! Choosing the one change to integrate from the changes observed across all
//! configured remotes.

use std::collections::HashSet;

use tracing::debug;

use crate::error::{IntegrationError, Outcome};
use crate::types::ChangeDescriptor;

/// Picks the single change relevant to `integration_remote`.
///
/// A change is relevant when its triggering branch is qualified by the
/// integration remote (`<remote>/...`). Relevant changes carrying the same
/// revision count once; the first one observed wins.
pub fn resolve(
    descriptors: &[ChangeDescriptor],
    integration_remote: &str,
) -> Result<Outcome<ChangeDescriptor>, IntegrationError> {
    let mut seen = HashSet::new();
    let relevant: Vec<&ChangeDescriptor> = descriptors
        .iter()
        .filter(|d| d.triggering_branch.is_qualified_by(integration_remote))
        .filter(|d| seen.insert(d.revision.clone()))
        .collect();

    debug!(
        observed = descriptors.len(),
        relevant = relevant.len(),
        remote = integration_remote,
        "Resolved changes"
    );

    match relevant.as_slice() {
        [] => Ok(Outcome::nothing_to_do(format!(
            "no revision matches remote '{}' among {} observed change(s)",
            integration_remote,
            descriptors.len()
        ))),
        [only] => Ok(Outcome::Completed((*only).clone())),
        many => Err(IntegrationError::AmbiguousConfiguration {
            remote: integration_remote.to_string(),
            branches: many
                .iter()
                .map(|d| d.triggering_branch.name.clone())
                .collect(),
        }),
    }
}
