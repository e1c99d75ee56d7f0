//! Runtime configuration built once at process start and passed by
//! reference to every component.
use clap::ValueEnum;
use secrecy::SecretString;
use std::{path::PathBuf, time::Duration};
use url::Url;

use crate::{
    Result, error::ReleaseNotesError,
    storage::connection::ConnectionString,
};

/// Number of days before "now" that bound both aggregator queries.
pub const DEFAULT_LOOKBACK_DAYS: u32 = 14;
/// Container (or directory) release documents are written to.
pub const DEFAULT_CONTAINER: &str = "releases";
/// Extension appended to the release name to form the document key.
pub const DOCUMENT_EXTENSION: &str = ".md";
/// Target branch reference for merged pull requests.
pub const DEFAULT_MAIN_BRANCH: &str = "refs/heads/main";
/// Work item states considered "done".
pub const DEFAULT_DONE_STATES: [&str; 3] = ["Done", "Resolved", "Closed"];
/// Timeout applied to every outbound HTTP request.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
/// Address the HTTP trigger listens on by default.
pub const DEFAULT_LISTEN_ADDRESS: &str = "127.0.0.1:7071";

const BRANCH_REF_PREFIX: &str = "refs/heads/";

/// How a report is written when a document with the same name exists.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WriteMode {
    /// Replace the existing document (last writer wins).
    #[default]
    Overwrite,
    /// Append the report to the existing document.
    Append,
}

/// Connection settings for the Azure DevOps organization.
#[derive(Debug, Clone)]
pub struct DevOpsConfig {
    /// Organization URL, e.g. `https://dev.azure.com/fabrikam`.
    pub organization_url: Url,
    /// Username paired with the access token for basic authentication.
    pub username: String,
    /// Personal access token.
    pub token: SecretString,
    /// Team project name.
    pub project: String,
    /// Repository name or id. When unset the first repository reported for
    /// the project is used.
    pub repository: Option<String>,
    /// Fully qualified target branch ref for merged pull requests.
    pub main_branch: String,
    /// States that count as done in the work item query.
    pub done_states: Vec<String>,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

/// Where release documents are persisted.
#[derive(Debug, Clone)]
pub enum StorageTarget {
    /// Azure Blob Storage account described by a connection string.
    AzureBlob(ConnectionString),
    /// Local directory, one sub-directory per container.
    Local(PathBuf),
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Storage backend. `None` is only valid in dry-run mode.
    pub target: Option<StorageTarget>,
    pub container: String,
    pub write_mode: WriteMode,
}

/// Top level configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub devops: DevOpsConfig,
    pub storage: StorageConfig,
    pub lookback_days: u32,
    /// Render reports without writing them.
    pub dry_run: bool,
    /// Key callers must present to the HTTP trigger. `None` leaves the
    /// trigger anonymous.
    pub function_key: Option<SecretString>,
}

impl Config {
    /// Check cross-field constraints that clap cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.devops.project.trim().is_empty() {
            return Err(ReleaseNotesError::invalid_config(
                "project name must not be empty",
            ));
        }

        if self.devops.done_states.is_empty() {
            return Err(ReleaseNotesError::invalid_config(
                "at least one done state is required",
            ));
        }

        if self.lookback_days == 0 {
            return Err(ReleaseNotesError::invalid_config(
                "lookback window must be at least one day",
            ));
        }

        if self.storage.container.trim().is_empty() {
            return Err(ReleaseNotesError::invalid_config(
                "storage container must not be empty",
            ));
        }

        if self.storage.target.is_none() && !self.dry_run {
            return Err(ReleaseNotesError::invalid_config(
                "a storage connection string or output directory is required \
                 unless running with --dry-run",
            ));
        }

        Ok(())
    }
}

/// Qualify a bare branch name with `refs/heads/`.
pub fn normalize_branch_ref(branch: &str) -> String {
    let branch = branch.trim();
    if branch.starts_with("refs/") {
        branch.to_string()
    } else {
        format!("{BRANCH_REF_PREFIX}{branch}")
    }
}
