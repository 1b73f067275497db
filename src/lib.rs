//! Branch Integrator - integrates verified changes into a shared branch.
//!
//! A change that passed verification on a candidate branch is brought onto
//! the integration branch with one of several strategies (fast-forward only,
//! squash, accumulated merge), built, and published only if the build meets
//! the required result. Attempts are serialized through a FIFO build queue.
//!
//! - [`resolve`]: pick the one relevant change among those observed
//! - [`graph`]: walk commits and render accumulated commit messages
//! - [`strategy`]: the integration strategies and their shared pre-steps
//! - [`coordinator`]: the prepare/build/publish state machine
//! - [`queue`]: FIFO serialization of attempts
//! - [`git`]: the repository adapter and its `git` CLI implementation

pub mod coordinator;
pub mod error;
pub mod git;
pub mod graph;
pub mod queue;
pub mod resolve;
pub mod strategy;
pub mod types;

#[cfg(test)]
pub mod test_utils;

pub use coordinator::{Coordinator, IntegrationReport, IntegrationRequest};
pub use error::{IntegrationError, Outcome};
pub use queue::BuildQueue;
