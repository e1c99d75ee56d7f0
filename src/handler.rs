//! Release notification handling: aggregate, assemble, store.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::*;

use crate::{
    Result,
    aggregate::{changes, work_items},
    backend::{
        azure::AzureDevOps,
        traits::{SourceControl, WorkItemTracker},
    },
    config::{Config, StorageTarget},
    error::ReleaseNotesError,
    event::ReleaseEvent,
    report::ReleaseReport,
    storage::{
        azure_blob::AzureBlobStore,
        local::LocalStore,
        traits::{Document, DocumentStore},
    },
    window::LookbackWindow,
};

/// Response body returned to the trigger on success.
pub const ACKNOWLEDGEMENT: &str = "Release Notes Updated";

/// Clients used by a single invocation.
pub struct Collaborators {
    pub tracker: Box<dyn WorkItemTracker>,
    pub source: Box<dyn SourceControl>,
    /// Absent only in dry-run mode.
    pub store: Option<Box<dyn DocumentStore>>,
}

/// Builds a fresh set of collaborators for every invocation.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, config: &Config) -> Result<Collaborators>;
}

/// Connects to Azure DevOps and the configured document store.
#[derive(Debug, Default, Clone, Copy)]
pub struct AzureConnector;

#[async_trait]
impl Connector for AzureConnector {
    async fn connect(&self, config: &Config) -> Result<Collaborators> {
        let devops = AzureDevOps::new(&config.devops)?;

        let store: Option<Box<dyn DocumentStore>> = match &config.storage.target
        {
            Some(StorageTarget::AzureBlob(connection)) => Some(Box::new(
                AzureBlobStore::new(connection, config.devops.request_timeout)?,
            )),
            Some(StorageTarget::Local(root)) => {
                Some(Box::new(LocalStore::new(root.clone())))
            }
            None => None,
        };

        Ok(Collaborators {
            tracker: Box::new(devops.clone()),
            source: Box::new(devops),
            store,
        })
    }
}

/// Result of a handled notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub document: Document,
    /// False when the run was a dry run.
    pub stored: bool,
}

/// Entry point shared by the HTTP trigger and the CLI.
pub struct ReleaseNotesHandler<C: Connector> {
    config: Config,
    connector: C,
}

impl<C: Connector> ReleaseNotesHandler<C> {
    pub fn new(config: Config, connector: C) -> Self {
        Self { config, connector }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Parse a raw notification body and handle it.
    pub async fn handle_body(&self, body: &[u8]) -> Result<Outcome> {
        let event = ReleaseEvent::from_slice(body)?;
        self.handle(event, Utc::now()).await
    }

    /// Handle an already parsed event with `now` as the end of the window.
    pub async fn handle(
        &self,
        event: ReleaseEvent,
        now: DateTime<Utc>,
    ) -> Result<Outcome> {
        let window = LookbackWindow::ending_at(now, self.config.lookback_days)?;

        info!(
            "generating release notes for '{}' covering changes since {}",
            event.name,
            window.since()
        );

        // clients live only for this invocation
        let collaborators = self.connector.connect(&self.config).await?;

        generate(&collaborators, &self.config, &event, &window).await
    }
}

/// Run both aggregators sequentially, assemble the report and write it.
pub async fn generate(
    collaborators: &Collaborators,
    config: &Config,
    event: &ReleaseEvent,
    window: &LookbackWindow,
) -> Result<Outcome> {
    let project = config.devops.project.as_str();

    let work_items = work_items::render_resolved(
        collaborators.tracker.as_ref(),
        project,
        window,
    )
    .await?;

    let changes = changes::render_merged(
        collaborators.source.as_ref(),
        project,
        config.devops.repository.as_deref(),
        &config.devops.main_branch,
        window,
    )
    .await?;

    let report = ReleaseReport::new(event, work_items, changes);

    let document = Document::for_release(
        config.storage.container.as_str(),
        &event.name,
        report.render(),
    );

    if config.dry_run {
        info!("dry run: skipping write of {}", document.name);
        return Ok(Outcome {
            document,
            stored: false,
        });
    }

    let store = collaborators.store.as_deref().ok_or_else(|| {
        ReleaseNotesError::invalid_config("no document store configured")
    })?;

    store.ensure_container(&document.container).await?;
    store.write(&document, config.storage.write_mode).await?;

    info!(
        "stored release notes {}/{}",
        document.container, document.name
    );

    Ok(Outcome {
        document,
        stored: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};
    use std::sync::Arc;

    use crate::{
        backend::types::{ChangeSummary, WorkItemQuery, WorkItemRef},
        config::WriteMode,
        storage::traits::MockDocumentStore,
        test_helpers::{
            CountingConnector, StaticConnector, create_test_config,
            mock_source_with_changes, mock_tracker_with_items,
        },
    };

    const EXPECTED_REPORT: &str = "# v1.2 \n Bugfixes \n\n\
        # Work Items Resolved:\n 1. #42-Fix crash\n\n\
        # Changes Merged:\n 1. #7-Patch null check";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap()
    }

    fn scenario_collaborators(store: MockDocumentStore) -> Collaborators {
        Collaborators {
            tracker: Box::new(mock_tracker_with_items(vec![(
                42,
                "Fix crash",
            )])),
            source: Box::new(mock_source_with_changes(vec![ChangeSummary {
                id: 7,
                title: "Patch null check".into(),
                closed_at: Some(now() - TimeDelta::days(3)),
            }])),
            store: Some(Box::new(store)),
        }
    }

    #[tokio::test]
    async fn test_end_to_end_report_is_stored_under_release_name() {
        let mut store = MockDocumentStore::new();
        store
            .expect_ensure_container()
            .withf(|container| container == "releases")
            .times(1)
            .returning(|_| Ok(()));
        store
            .expect_write()
            .withf(|doc, mode| {
                doc.container == "releases"
                    && doc.name == "v1.2.md"
                    && doc.content == EXPECTED_REPORT
                    && *mode == WriteMode::Overwrite
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let config = create_test_config("https://dev.azure.com/fabrikam");
        let window = LookbackWindow::ending_at(now(), 14).unwrap();

        let outcome = generate(
            &scenario_collaborators(store),
            &config,
            &ReleaseEvent::new("v1.2", "Bugfixes"),
            &window,
        )
        .await
        .unwrap();

        assert!(outcome.stored);
        assert_eq!(outcome.document.content, EXPECTED_REPORT);
    }

    #[tokio::test]
    async fn test_handle_body_parses_payload_and_uses_connector() {
        let connector = StaticConnector::new(|| {
            let mut store = MockDocumentStore::new();
            store.expect_ensure_container().returning(|_| Ok(()));
            store
                .expect_write()
                .withf(|doc, _| doc.name == "v1.2.md")
                .times(1)
                .returning(|_, _| Ok(()));
            scenario_collaborators(store)
        });

        let handler = ReleaseNotesHandler::new(
            create_test_config("https://dev.azure.com/fabrikam"),
            connector,
        );

        let body = serde_json::json!({
            "resource": {
                "release": { "name": "v1.2", "description": "Bugfixes" }
            }
        })
        .to_string();

        let outcome = handler.handle_body(body.as_bytes()).await.unwrap();

        assert_eq!(outcome.document.name, "v1.2.md");
    }

    #[tokio::test]
    async fn test_each_invocation_connects_and_drops_its_own_clients() {
        let connector = CountingConnector::new(|token: Arc<()>| {
            let mut store = MockDocumentStore::new();
            store.expect_ensure_container().returning(|_| Ok(()));
            // a reused store would fail this on the second invocation
            store.expect_write().times(1).returning(move |_, _| {
                let _held = &token;
                Ok(())
            });
            scenario_collaborators(store)
        });

        let handler = ReleaseNotesHandler::new(
            create_test_config("https://dev.azure.com/fabrikam"),
            connector,
        );

        let body = serde_json::json!({
            "resource": {
                "release": { "name": "v1.2", "description": "Bugfixes" }
            }
        })
        .to_string();

        handler.handle_body(body.as_bytes()).await.unwrap();
        assert_eq!(handler.connector.connects(), 1);
        assert_eq!(handler.connector.live(), 0);

        handler.handle_body(body.as_bytes()).await.unwrap();
        assert_eq!(handler.connector.connects(), 2);
        assert_eq!(handler.connector.live(), 0);
    }

    #[tokio::test]
    async fn test_dry_run_renders_without_writing() {
        let mut store = MockDocumentStore::new();
        store.expect_ensure_container().never();
        store.expect_write().never();

        let mut config = create_test_config("https://dev.azure.com/fabrikam");
        config.dry_run = true;
        let window = LookbackWindow::ending_at(now(), 14).unwrap();

        let outcome = generate(
            &scenario_collaborators(store),
            &config,
            &ReleaseEvent::new("v1.2", "Bugfixes"),
            &window,
        )
        .await
        .unwrap();

        assert!(!outcome.stored);
        assert_eq!(outcome.document.content, EXPECTED_REPORT);
    }

    #[tokio::test]
    async fn test_empty_release_sections_still_stored() {
        let mut store = MockDocumentStore::new();
        store.expect_ensure_container().returning(|_| Ok(()));
        store
            .expect_write()
            .withf(|doc, _| {
                doc.name == ".md"
                    && doc.content
                        == "#  \n  \n\n# Work Items Resolved:\
                            \n\n# Changes Merged:"
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let collaborators = Collaborators {
            tracker: Box::new(mock_tracker_with_items(vec![])),
            source: Box::new(mock_source_with_changes(vec![])),
            store: Some(Box::new(store)),
        };

        let config = create_test_config("https://dev.azure.com/fabrikam");
        let window = LookbackWindow::ending_at(now(), 14).unwrap();

        generate(&collaborators, &config, &ReleaseEvent::default(), &window)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_storage_failure_is_reported() {
        let mut store = MockDocumentStore::new();
        store.expect_ensure_container().returning(|_| Ok(()));
        store
            .expect_write()
            .returning(|_, _| Err(ReleaseNotesError::storage("403 Forbidden")));

        let config = create_test_config("https://dev.azure.com/fabrikam");
        let window = LookbackWindow::ending_at(now(), 14).unwrap();

        let result = generate(
            &scenario_collaborators(store),
            &config,
            &ReleaseEvent::new("v1.2", "Bugfixes"),
            &window,
        )
        .await;

        assert!(matches!(result, Err(ReleaseNotesError::StorageError(_))));
    }

    #[tokio::test]
    async fn test_work_item_failure_stops_before_storage() {
        let mut tracker = crate::backend::traits::MockWorkItemTracker::new();
        tracker
            .expect_query_done_items()
            .returning(|_, _| Err(ReleaseNotesError::RateLimitExceeded));

        let mut store = MockDocumentStore::new();
        store.expect_write().never();

        let collaborators = Collaborators {
            tracker: Box::new(tracker),
            source: Box::new(crate::backend::traits::MockSourceControl::new()),
            store: Some(Box::new(store)),
        };

        let config = create_test_config("https://dev.azure.com/fabrikam");
        let window = LookbackWindow::ending_at(now(), 14).unwrap();

        let result = generate(
            &collaborators,
            &config,
            &ReleaseEvent::new("v1.2", "Bugfixes"),
            &window,
        )
        .await;

        assert!(matches!(result, Err(ReleaseNotesError::RateLimitExceeded)));
    }

    #[tokio::test]
    async fn test_work_items_fetched_with_query_snapshot() {
        let as_of = now();
        let mut tracker = crate::backend::traits::MockWorkItemTracker::new();
        tracker.expect_query_done_items().returning(move |_, _| {
            Ok(WorkItemQuery {
                refs: vec![WorkItemRef { id: 1 }],
                as_of: Some(as_of),
            })
        });
        tracker
            .expect_fetch_item_fields()
            .withf(move |_, snapshot| *snapshot == Some(as_of))
            .times(1)
            .returning(|_, _| Ok(vec![]));

        let mut config = create_test_config("https://dev.azure.com/fabrikam");
        config.dry_run = true;
        let window = LookbackWindow::ending_at(now(), 14).unwrap();

        let collaborators = Collaborators {
            tracker: Box::new(tracker),
            source: Box::new(mock_source_with_changes(vec![])),
            store: None,
        };

        let outcome = generate(
            &collaborators,
            &config,
            &ReleaseEvent::new("v3", ""),
            &window,
        )
        .await
        .unwrap();

        assert!(!outcome.stored);
    }
}
