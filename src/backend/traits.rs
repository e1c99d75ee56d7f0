//! Traits related to remote project backends
use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;

use crate::{
    Result,
    backend::types::{ChangeSummary, Repository, WorkItemQuery, WorkItemSummary},
};

/// Two phase work item retrieval: a query that returns references plus a
/// snapshot token, then a fetch of the fields for those references.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait WorkItemTracker: Send + Sync {
    /// Items in `project` with a done state closed at or after `since`,
    /// ordered by state ascending then changed date descending.
    async fn query_done_items(
        &self,
        project: &str,
        since: DateTime<Utc>,
    ) -> Result<WorkItemQuery>;

    /// Id and title for every id, in the order given, as of the snapshot.
    async fn fetch_item_fields(
        &self,
        ids: &[i64],
        as_of: Option<DateTime<Utc>>,
    ) -> Result<Vec<WorkItemSummary>>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait SourceControl: Send + Sync {
    /// Repositories in `project` in backend order.
    async fn list_repositories(&self, project: &str) -> Result<Vec<Repository>>;

    /// Completed pull requests whose target is `target_ref`. Close dates are
    /// not filtered here.
    async fn list_completed_pull_requests(
        &self,
        project: &str,
        repository_id: &str,
        target_ref: &str,
    ) -> Result<Vec<ChangeSummary>>;
}
