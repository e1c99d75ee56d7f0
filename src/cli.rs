//! CLI argument parsing and runtime configuration.
use clap::{Args as ClapArgs, Parser, Subcommand};
use secrecy::SecretString;
use std::{path::PathBuf, time::Duration};
use tokio::io::AsyncReadExt;
use url::Url;

use crate::{
    Result,
    config::{
        Config, DEFAULT_CONTAINER, DEFAULT_DONE_STATES, DEFAULT_LISTEN_ADDRESS,
        DEFAULT_LOOKBACK_DAYS, DEFAULT_MAIN_BRANCH,
        DEFAULT_REQUEST_TIMEOUT_SECS, DevOpsConfig, StorageConfig,
        StorageTarget, WriteMode, normalize_branch_ref,
    },
    error::ReleaseNotesError,
    event::ReleaseEvent,
    storage::connection::ConnectionString,
};

/// Global CLI arguments for backend, storage and debugging.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[arg(long, env = "DEVOPS_ORGANIZATION_URL", global = true)]
    /// Azure DevOps organization URL (https://dev.azure.com/org).
    pub organization_url: Option<String>,

    #[arg(long, env = "DEVOPS_USERNAME", default_value = "", global = true)]
    /// Username paired with the access token.
    pub username: String,

    #[arg(
        long,
        env = "DEVOPS_ACCESS_TOKEN",
        hide_env_values = true,
        global = true
    )]
    /// Personal access token with work item and code read scopes.
    pub access_token: Option<String>,

    #[arg(long, env = "DEVOPS_PROJECT_NAME", global = true)]
    /// Team project to aggregate.
    pub project: Option<String>,

    #[arg(long, env = "DEVOPS_REPOSITORY", global = true)]
    /// Repository name or id. Defaults to the first repository in the
    /// project.
    pub repository: Option<String>,

    #[arg(long, default_value = DEFAULT_MAIN_BRANCH, global = true)]
    /// Target branch of merged pull requests.
    pub main_branch: String,

    #[arg(long = "done-state", global = true)]
    /// Work item state treated as done. Repeatable. Defaults to Done,
    /// Resolved and Closed.
    pub done_states: Vec<String>,

    #[arg(
        long,
        default_value_t = DEFAULT_LOOKBACK_DAYS,
        value_parser = clap::value_parser!(u32).range(1..),
        global = true
    )]
    /// Number of days before now included in the report.
    pub lookback_days: u32,

    #[arg(
        long,
        env = "STORAGE_CONNECTION_STRING",
        hide_env_values = true,
        conflicts_with = "output_dir",
        global = true
    )]
    /// Azure Storage connection string.
    pub storage_connection_string: Option<String>,

    #[arg(long, global = true)]
    /// Write reports to a local directory instead of blob storage.
    pub output_dir: Option<PathBuf>,

    #[arg(long, default_value = DEFAULT_CONTAINER, global = true)]
    /// Container (or sub-directory) reports are written to.
    pub container: String,

    #[arg(
        long,
        value_enum,
        default_value_t = WriteMode::Overwrite,
        global = true
    )]
    /// How to handle an existing report for the same release.
    pub write_mode: WriteMode,

    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS, global = true)]
    /// Timeout in seconds for every outbound request.
    pub request_timeout_secs: u64,

    #[arg(long, default_value_t = false, global = true)]
    /// Render reports without writing them.
    pub dry_run: bool,

    #[arg(long, env = "FUNCTION_KEY", hide_env_values = true, global = true)]
    /// Key required from HTTP callers via the `x-functions-key` header or
    /// the `code` query parameter. Unset leaves the trigger anonymous.
    pub function_key: Option<String>,

    #[arg(long, default_value_t = false, global = true)]
    /// Enable debug logging.
    pub debug: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Trigger subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Listen for release notifications over HTTP.
    Serve {
        #[arg(long, default_value = DEFAULT_LISTEN_ADDRESS)]
        /// Socket address to bind.
        address: String,
    },

    /// Generate release notes once and exit.
    Generate(GenerateArgs),
}

/// Source of the release event for a one-off run.
#[derive(ClapArgs, Debug)]
pub struct GenerateArgs {
    #[arg(long, conflicts_with_all = ["name", "description"])]
    /// Notification payload file. Use `-` to read from stdin.
    pub payload: Option<PathBuf>,

    #[arg(long)]
    /// Release name.
    pub name: Option<String>,

    #[arg(long, requires = "name")]
    /// Release description.
    pub description: Option<String>,
}

impl GenerateArgs {
    /// Load the event from the payload source or the explicit values.
    pub async fn load_event(&self) -> Result<ReleaseEvent> {
        if let Some(path) = &self.payload {
            let body = if path.as_os_str() == "-" {
                let mut buf = vec![];
                tokio::io::stdin().read_to_end(&mut buf).await?;
                buf
            } else {
                tokio::fs::read(path).await?
            };
            return ReleaseEvent::from_slice(&body);
        }

        if let Some(name) = &self.name {
            return Ok(ReleaseEvent::new(
                name.as_str(),
                self.description.clone().unwrap_or_default(),
            ));
        }

        Err(ReleaseNotesError::InvalidArgs(
            "must provide either --payload or --name".to_string(),
        ))
    }
}

impl Args {
    /// Build and validate the runtime configuration.
    pub fn config(&self) -> Result<Config> {
        let organization_url = self
            .organization_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| {
                ReleaseNotesError::InvalidArgs(
                    "must set organization url: --organization-url or \
                     DEVOPS_ORGANIZATION_URL"
                        .to_string(),
                )
            })?;

        let organization_url = Url::parse(organization_url.trim())?;
        validate_scheme(&organization_url)?;

        let token = self
            .access_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                ReleaseNotesError::InvalidArgs(
                    "must set access token: --access-token or \
                     DEVOPS_ACCESS_TOKEN"
                        .to_string(),
                )
            })?;

        let project = self
            .project
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| {
                ReleaseNotesError::InvalidArgs(
                    "must set project: --project or DEVOPS_PROJECT_NAME"
                        .to_string(),
                )
            })?;

        let done_states = if self.done_states.is_empty() {
            DEFAULT_DONE_STATES.iter().map(|s| s.to_string()).collect()
        } else {
            self.done_states.clone()
        };

        let target = match (&self.storage_connection_string, &self.output_dir)
        {
            (Some(connection), _) if !connection.trim().is_empty() => {
                Some(StorageTarget::AzureBlob(
                    connection.parse::<ConnectionString>()?,
                ))
            }
            (_, Some(dir)) => Some(StorageTarget::Local(dir.clone())),
            _ => None,
        };

        let config = Config {
            devops: DevOpsConfig {
                organization_url,
                username: self.username.clone(),
                token: SecretString::from(token.to_string()),
                project: project.to_string(),
                repository: self
                    .repository
                    .clone()
                    .filter(|r| !r.trim().is_empty()),
                main_branch: normalize_branch_ref(&self.main_branch),
                done_states,
                request_timeout: Duration::from_secs(self.request_timeout_secs),
            },
            storage: StorageConfig {
                target,
                container: self.container.clone(),
                write_mode: self.write_mode,
            },
            lookback_days: self.lookback_days,
            dry_run: self.dry_run,
            function_key: self
                .function_key
                .as_deref()
                .filter(|k| !k.is_empty())
                .map(|k| SecretString::from(k.to_string())),
        };

        config.validate()?;

        Ok(config)
    }
}

fn validate_scheme(url: &Url) -> Result<()> {
    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(ReleaseNotesError::InvalidArgs(format!(
            "unsupported organization url scheme: {scheme}"
        ))),
    }
}
