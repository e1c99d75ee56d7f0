use log::*;

use crate::{
    Result,
    backend::{
        traits::SourceControl,
        types::{ChangeSummary, Repository},
    },
    error::ReleaseNotesError,
    report::render_entries,
    window::LookbackWindow,
};

/// Pick the repository to read pull requests from: the configured one
/// (matched by id or case-insensitive name) or else the first one the
/// backend reports.
pub async fn resolve_repository(
    source: &dyn SourceControl,
    project: &str,
    configured: Option<&str>,
) -> Result<Repository> {
    let repositories = source.list_repositories(project).await?;

    if let Some(wanted) = configured {
        return repositories
            .into_iter()
            .find(|r| r.id == wanted || r.name.eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ReleaseNotesError::RepositoryNotFound {
                project: project.to_string(),
                repository: wanted.to_string(),
            });
    }

    let first = repositories.into_iter().next().ok_or_else(|| {
        ReleaseNotesError::NoRepository {
            project: project.to_string(),
        }
    })?;

    warn!(
        "no repository configured: using first repository in \
         project '{project}': {}",
        first.name
    );

    Ok(first)
}

/// Second filter stage: keep changes closed at or after the window start,
/// preserving input order. Changes without a close date are dropped.
pub fn closed_since(
    changes: Vec<ChangeSummary>,
    window: &LookbackWindow,
) -> Vec<ChangeSummary> {
    changes
        .into_iter()
        .filter(|change| match change.closed_at {
            Some(closed_at) => window.contains(closed_at),
            None => {
                debug!(
                    "pull request #{} has no close date: skipping",
                    change.id
                );
                false
            }
        })
        .collect()
}

/// Completed pull requests into `target_ref` that closed inside the window.
pub async fn collect_merged(
    source: &dyn SourceControl,
    project: &str,
    repository: Option<&str>,
    target_ref: &str,
    window: &LookbackWindow,
) -> Result<Vec<ChangeSummary>> {
    let repository = resolve_repository(source, project, repository).await?;

    // first stage: status and target branch, applied by the backend
    let completed = source
        .list_completed_pull_requests(project, &repository.id, target_ref)
        .await?;

    if completed.is_empty() {
        info!("no completed pull requests in {}", repository.name);
        return Ok(vec![]);
    }

    let total = completed.len();
    let merged = closed_since(completed, window);

    info!(
        "{} of {total} completed pull request(s) closed since {}",
        merged.len(),
        window.since()
    );

    Ok(merged)
}

/// Rendered "Changes Merged" section body.
pub async fn render_merged(
    source: &dyn SourceControl,
    project: &str,
    repository: Option<&str>,
    target_ref: &str,
    window: &LookbackWindow,
) -> Result<String> {
    let changes =
        collect_merged(source, project, repository, target_ref, window).await?;
    Ok(render_entries(
        changes.iter().map(|change| (change.id, change.title.as_str())),
    ))
}
