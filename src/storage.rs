//! Document storage for rendered release reports.

/// Azure Blob Storage implementation over the REST API.
pub mod azure_blob;

/// Storage account connection string parsing.
pub mod connection;

/// Local directory implementation for offline runs and testing.
pub mod local;

/// Common trait and document type.
pub mod traits;
