//! Common test helper functions shared across test modules.
//!
//! This module provides reusable fixtures and pre-programmed mocks,
//! reducing code duplication across different test suites.
use async_trait::async_trait;
use secrecy::SecretString;
use std::{
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use url::Url;

use crate::{
    Result,
    backend::{
        traits::{MockSourceControl, MockWorkItemTracker},
        types::{
            ChangeSummary, Repository, WorkItemQuery, WorkItemRef,
            WorkItemSummary,
        },
    },
    config::{
        Config, DEFAULT_CONTAINER, DEFAULT_DONE_STATES, DEFAULT_LOOKBACK_DAYS,
        DEFAULT_MAIN_BRANCH, DevOpsConfig, StorageConfig, StorageTarget,
        WriteMode,
    },
    handler::{Collaborators, Connector},
};

/// Creates a valid Config pointing at `organization_url`.
///
/// # Example
/// ```ignore
/// let config = create_test_config("https://dev.azure.com/fabrikam");
/// ```
pub fn create_test_config(organization_url: &str) -> Config {
    Config {
        devops: DevOpsConfig {
            organization_url: Url::parse(organization_url)
                .expect("valid test organization url"),
            username: "builder".to_string(),
            token: SecretString::from("test-token".to_string()),
            project: "Fabrikam".to_string(),
            repository: None,
            main_branch: DEFAULT_MAIN_BRANCH.to_string(),
            done_states: DEFAULT_DONE_STATES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            request_timeout: Duration::from_secs(5),
        },
        storage: StorageConfig {
            target: Some(StorageTarget::Local(PathBuf::from("release-notes"))),
            container: DEFAULT_CONTAINER.to_string(),
            write_mode: WriteMode::Overwrite,
        },
        lookback_days: DEFAULT_LOOKBACK_DAYS,
        dry_run: false,
        function_key: None,
    }
}

/// Tracker mock whose query returns `items` in order and whose fetch
/// resolves them to their titles.
pub fn mock_tracker_with_items(
    items: Vec<(i64, &'static str)>,
) -> MockWorkItemTracker {
    let mut tracker = MockWorkItemTracker::new();

    let refs = items
        .iter()
        .map(|(id, _)| WorkItemRef { id: *id })
        .collect::<Vec<WorkItemRef>>();

    tracker.expect_query_done_items().returning(move |_, _| {
        Ok(WorkItemQuery {
            refs: refs.clone(),
            as_of: None,
        })
    });

    tracker.expect_fetch_item_fields().returning(move |_, _| {
        Ok(items
            .iter()
            .map(|(id, title)| WorkItemSummary {
                id: *id,
                title: title.to_string(),
            })
            .collect())
    });

    tracker
}

/// Source control mock with a single repository whose completed pull
/// requests are `changes`.
pub fn mock_source_with_changes(
    changes: Vec<ChangeSummary>,
) -> MockSourceControl {
    let mut source = MockSourceControl::new();

    source.expect_list_repositories().returning(|_| {
        Ok(vec![Repository {
            id: "guid-1".to_string(),
            name: "Fiber".to_string(),
        }])
    });

    source
        .expect_list_completed_pull_requests()
        .returning(move |_, _, _| Ok(changes.clone()));

    source
}

/// Connector that hands out collaborators produced by a closure.
pub struct StaticConnector<F> {
    build: F,
}

impl<F> StaticConnector<F>
where
    F: Fn() -> Collaborators + Send + Sync,
{
    pub fn new(build: F) -> Self {
        Self { build }
    }
}

#[async_trait]
impl<F> Connector for StaticConnector<F>
where
    F: Fn() -> Collaborators + Send + Sync,
{
    async fn connect(&self, _config: &Config) -> Result<Collaborators> {
        Ok((self.build)())
    }
}

/// Connector that counts how many collaborator sets it built and how many
/// of them are still alive.
///
/// `build` receives a liveness token that must end up owned by the
/// returned collaborators (e.g. moved into a mock's `returning` closure).
pub struct CountingConnector<F> {
    build: F,
    connects: AtomicUsize,
    live: Arc<()>,
}

impl<F> CountingConnector<F>
where
    F: Fn(Arc<()>) -> Collaborators + Send + Sync,
{
    pub fn new(build: F) -> Self {
        Self {
            build,
            connects: AtomicUsize::new(0),
            live: Arc::new(()),
        }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Collaborator sets built here that have not been dropped yet.
    pub fn live(&self) -> usize {
        Arc::strong_count(&self.live) - 1
    }
}

#[async_trait]
impl<F> Connector for CountingConnector<F>
where
    F: Fn(Arc<()>) -> Collaborators + Send + Sync,
{
    async fn connect(&self, _config: &Config) -> Result<Collaborators> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok((self.build)(Arc::clone(&self.live)))
    }
}
