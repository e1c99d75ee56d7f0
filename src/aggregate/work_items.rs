use log::*;

use crate::{
    Result,
    backend::{traits::WorkItemTracker, types::WorkItemSummary},
    report::render_entries,
    window::LookbackWindow,
};

/// Query done items closed inside the window and resolve their titles.
/// An empty query result skips the fetch phase entirely.
pub async fn collect_resolved(
    tracker: &dyn WorkItemTracker,
    project: &str,
    window: &LookbackWindow,
) -> Result<Vec<WorkItemSummary>> {
    let query = tracker.query_done_items(project, window.since()).await?;

    if query.refs.is_empty() {
        info!("no resolved work items since {}", window.since());
        return Ok(vec![]);
    }

    debug!(
        "fetching fields for {} work item(s) as of {:?}",
        query.refs.len(),
        query.as_of
    );

    tracker.fetch_item_fields(&query.ids(), query.as_of).await
}

/// Rendered "Work Items Resolved" section body.
pub async fn render_resolved(
    tracker: &dyn WorkItemTracker,
    project: &str,
    window: &LookbackWindow,
) -> Result<String> {
    let items = collect_resolved(tracker, project, window).await?;
    Ok(render_entries(
        items.iter().map(|item| (item.id, item.title.as_str())),
    ))
}
