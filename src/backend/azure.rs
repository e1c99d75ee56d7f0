//! Implements the backend traits for Azure DevOps Services and Server
use async_trait::async_trait;
use base64::{Engine, prelude::BASE64_STANDARD};
use chrono::{DateTime, SecondsFormat, Utc};
use log::*;
use reqwest::{
    Client, Response, Url,
    header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue},
};
use secrecy::ExposeSecret;
use std::collections::HashMap;

use crate::{
    Result,
    backend::{
        azure::types::{
            AzurePullRequest, AzureRepository, AzureWorkItem, ListResponse,
            WiqlRequest, WiqlResponse,
        },
        traits::{SourceControl, WorkItemTracker},
        types::{
            ChangeSummary, Repository, WorkItemQuery, WorkItemRef,
            WorkItemSummary,
        },
    },
    config::DevOpsConfig,
    error::ReleaseNotesError,
};

mod types;

/// REST API version sent with every request.
pub const API_VERSION: &str = "7.1";
/// Maximum ids accepted by a single work item fetch.
pub const MAX_WORK_ITEM_BATCH: usize = 200;
/// Page size for pull request listing.
pub const DEFAULT_PAGE_SIZE: usize = 100;
/// Field holding a work item's id.
pub const ID_FIELD: &str = "System.Id";
/// Field holding a work item's title.
pub const TITLE_FIELD: &str = "System.Title";

const COMPLETED_STATUS: &str = "completed";

/// Azure DevOps client using reqwest for work item queries and pull request
/// listing. One instance serves both backend traits.
#[derive(Debug, Clone)]
pub struct AzureDevOps {
    client: Client,
    organization_url: Url,
    done_states: Vec<String>,
}

impl AzureDevOps {
    /// Create client with basic authentication from the configured
    /// username/access token pair.
    pub fn new(config: &DevOpsConfig) -> Result<Self> {
        let credentials = format!(
            "{}:{}",
            config.username,
            config.token.expose_secret()
        );

        let mut token_value = HeaderValue::from_str(&format!(
            "Basic {}",
            BASE64_STANDARD.encode(credentials)
        ))?;
        token_value.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.append(AUTHORIZATION, token_value);
        headers.append(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            organization_url: config.organization_url.clone(),
            done_states: config.done_states.clone(),
        })
    }

    /// Organization URL extended with percent-encoded path segments and the
    /// api-version query parameter.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.organization_url.clone();

        url.path_segments_mut()
            .map_err(|_| {
                ReleaseNotesError::invalid_config(format!(
                    "organization url cannot be used as a base: {}",
                    self.organization_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);

        url.query_pairs_mut().append_pair("api-version", API_VERSION);

        Ok(url)
    }
}

/// Build the WIQL statement selecting done items closed since `since`.
pub fn build_done_items_query(
    project: &str,
    done_states: &[String],
    since: DateTime<Utc>,
) -> String {
    let states = done_states
        .iter()
        .map(|s| wiql_literal(s))
        .collect::<Vec<String>>()
        .join(", ");

    format!(
        "SELECT [System.Id], [System.Title], [System.State] \
         FROM WorkItems \
         WHERE [System.TeamProject] = {} \
         AND [System.State] IN ({states}) \
         AND [Microsoft.VSTS.Common.ClosedDate] >= {} \
         ORDER BY [System.State] ASC, [System.ChangedDate] DESC",
        wiql_literal(project),
        wiql_literal(&format_timestamp(since)),
    )
}

fn wiql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Status failures other than authorization and throttling are backend
/// errors.
fn check_status(response: Response) -> Result<Response> {
    response.error_for_status().map_err(|err| {
        match ReleaseNotesError::from(err) {
            ReleaseNotesError::NetworkError(msg) => {
                ReleaseNotesError::backend(msg)
            }
            other => other,
        }
    })
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)?.with_timezone(&Utc))
}

#[async_trait]
impl WorkItemTracker for AzureDevOps {
    async fn query_done_items(
        &self,
        project: &str,
        since: DateTime<Utc>,
    ) -> Result<WorkItemQuery> {
        let query = build_done_items_query(project, &self.done_states, since);
        debug!("executing wiql: {query}");

        let mut url = self.endpoint(&[project, "_apis", "wit", "wiql"])?;
        url.query_pairs_mut().append_pair("timePrecision", "true");

        let request = self
            .client
            .post(url)
            .json(&WiqlRequest { query })
            .build()?;
        let response = self.client.execute(request).await?;
        let result = check_status(response)?;
        let wiql: WiqlResponse = result.json().await?;

        let as_of = match wiql.as_of {
            Some(value) => Some(parse_timestamp(&value)?),
            None => None,
        };

        let refs = wiql
            .work_items
            .into_iter()
            .map(|item| WorkItemRef { id: item.id })
            .collect::<Vec<WorkItemRef>>();

        info!("work item query matched {} item(s)", refs.len());

        Ok(WorkItemQuery { refs, as_of })
    }

    async fn fetch_item_fields(
        &self,
        ids: &[i64],
        as_of: Option<DateTime<Utc>>,
    ) -> Result<Vec<WorkItemSummary>> {
        let mut summaries = vec![];

        for batch in ids.chunks(MAX_WORK_ITEM_BATCH) {
            let mut url = self.endpoint(&["_apis", "wit", "workitems"])?;

            let joined = batch
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<String>>()
                .join(",");

            url.query_pairs_mut()
                .append_pair("ids", &joined)
                .append_pair("fields", &format!("{ID_FIELD},{TITLE_FIELD}"));

            if let Some(as_of) = as_of {
                url.query_pairs_mut()
                    .append_pair("asOf", &format_timestamp(as_of));
            }

            let request = self.client.get(url).build()?;
            let response = self.client.execute(request).await?;
            let result = check_status(response)?;
            let list: ListResponse<AzureWorkItem> = result.json().await?;

            let mut by_id = list
                .value
                .into_iter()
                .map(|item| (item.id, item))
                .collect::<HashMap<i64, AzureWorkItem>>();

            // keep the query's ordering regardless of response order
            for id in batch {
                let Some(item) = by_id.remove(id) else {
                    warn!(
                        "work item #{id} was not returned by fetch: skipping"
                    );
                    continue;
                };

                let title = item
                    .fields
                    .get(TITLE_FIELD)
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| {
                        ReleaseNotesError::missing_field(item.id, TITLE_FIELD)
                    })?;

                summaries.push(WorkItemSummary {
                    id: item.id,
                    title: title.to_string(),
                });
            }
        }

        Ok(summaries)
    }
}

#[async_trait]
impl SourceControl for AzureDevOps {
    async fn list_repositories(
        &self,
        project: &str,
    ) -> Result<Vec<Repository>> {
        let url = self.endpoint(&[project, "_apis", "git", "repositories"])?;
        let request = self.client.get(url).build()?;
        let response = self.client.execute(request).await?;
        let result = check_status(response)?;
        let list: ListResponse<AzureRepository> = result.json().await?;

        Ok(list
            .value
            .into_iter()
            .map(|r| Repository {
                id: r.id,
                name: r.name,
            })
            .collect())
    }

    async fn list_completed_pull_requests(
        &self,
        project: &str,
        repository_id: &str,
        target_ref: &str,
    ) -> Result<Vec<ChangeSummary>> {
        let mut skip = 0;
        let mut changes = vec![];

        loop {
            let mut url = self.endpoint(&[
                project,
                "_apis",
                "git",
                "repositories",
                repository_id,
                "pullrequests",
            ])?;

            url.query_pairs_mut()
                .append_pair("searchCriteria.status", COMPLETED_STATUS)
                .append_pair("searchCriteria.targetRefName", target_ref)
                .append_pair("$top", &DEFAULT_PAGE_SIZE.to_string())
                .append_pair("$skip", &skip.to_string());

            let request = self.client.get(url).build()?;
            let response = self.client.execute(request).await?;
            let result = check_status(response)?;
            let page: ListResponse<AzurePullRequest> = result.json().await?;

            let page_len = page.value.len();

            for pr in page.value.into_iter() {
                if let Some(status) = &pr.status
                    && !status.eq_ignore_ascii_case(COMPLETED_STATUS)
                {
                    debug!(
                        "skipping pull request #{} with status {status}",
                        pr.pull_request_id
                    );
                    continue;
                }

                if let Some(target) = &pr.target_ref_name
                    && target != target_ref
                {
                    debug!(
                        "skipping pull request #{} targeting {target}",
                        pr.pull_request_id
                    );
                    continue;
                }

                let closed_at = match pr.closed_date.as_deref() {
                    Some(value) => Some(parse_timestamp(value)?),
                    None => None,
                };

                changes.push(ChangeSummary {
                    id: pr.pull_request_id,
                    title: pr.title,
                    closed_at,
                });
            }

            if page_len < DEFAULT_PAGE_SIZE {
                break;
            }

            skip += page_len;
        }

        info!(
            "found {} completed pull request(s) targeting {target_ref}",
            changes.len()
        );

        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use crate::test_helpers::create_test_config;

    #[test]
    fn test_done_items_query_filters_state_date_and_order() {
        let since = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let states = vec!["Done".to_string(), "Closed".to_string()];

        let query = build_done_items_query("Fabrikam", &states, since);

        assert!(query.contains("[System.TeamProject] = 'Fabrikam'"));
        assert!(query.contains("[System.State] IN ('Done', 'Closed')"));
        assert!(query.contains(
            "[Microsoft.VSTS.Common.ClosedDate] >= '2024-03-01T12:00:00Z'"
        ));
        assert!(query.ends_with(
            "ORDER BY [System.State] ASC, [System.ChangedDate] DESC"
        ));
    }

    #[test]
    fn test_done_items_query_escapes_quotes() {
        let since = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let states = vec!["Won't Fix".to_string()];

        let query = build_done_items_query("O'Brien", &states, since);

        assert!(query.contains("= 'O''Brien'"));
        assert!(query.contains("IN ('Won''t Fix')"));
    }

    #[test]
    fn test_endpoint_encodes_segments_and_version() {
        let config = create_test_config("https://dev.azure.com/fabrikam/");
        let client = AzureDevOps::new(&config.devops).unwrap();

        let url = client
            .endpoint(&["Fabrikam Fiber", "_apis", "git", "repositories"])
            .unwrap();

        assert_eq!(
            url.as_str(),
            "https://dev.azure.com/fabrikam/Fabrikam%20Fiber\
             /_apis/git/repositories?api-version=7.1"
        );
    }

    #[test]
    fn test_parse_timestamp_normalizes_to_utc() {
        let parsed = parse_timestamp("2024-03-02T10:00:00+02:00").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 3, 2, 8, 0, 0).unwrap());
    }
}
