//! Project-tracking and version-control backends.
//!
//! The aggregators only see the capability traits; the Azure DevOps REST
//! client is one implementation of both.

/// Azure DevOps REST client for work item tracking and git.
pub mod azure;

/// Capability traits consumed by the aggregators.
pub mod traits;

/// Backend-neutral records returned by the traits.
pub mod types;
