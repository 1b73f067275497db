//! Core domain types for the integration engine.
//!
//! These types are plain data: the engine reads commits and branches from the
//! repository adapter and never mutates them.

pub mod branch;
pub mod commit;
pub mod config;
pub mod identity;
pub mod ids;

pub use branch::{Branch, ChangeDescriptor, RemoteConfig, remove_remote_prefix};
pub use commit::Commit;
pub use config::{BuildResult, DEFAULT_REMOTE, IntegrationConfig, StrategyKind, UnknownVariant};
pub use identity::{Identity, IdentityError};
pub use ids::{InvalidSha, Sha};
