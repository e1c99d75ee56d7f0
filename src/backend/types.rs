use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Reference to a work item returned by a query.
pub struct WorkItemRef {
    pub id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Result of the query phase of work item retrieval.
pub struct WorkItemQuery {
    pub refs: Vec<WorkItemRef>,
    /// Snapshot the query was evaluated at.
    pub as_of: Option<DateTime<Utc>>,
}

impl WorkItemQuery {
    pub fn ids(&self) -> Vec<i64> {
        self.refs.iter().map(|r| r.id).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItemSummary {
    pub id: i64,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A merged pull request.
pub struct ChangeSummary {
    pub id: i64,
    pub title: String,
    pub closed_at: Option<DateTime<Utc>>,
}
