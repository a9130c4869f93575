//! Default-branch commit totals

use chrono::{DateTime, SecondsFormat, Utc};
use gitpulse_core::{CommitTotals, PulseResult, RepositoryId};
use serde_json::{json, Value};
use tracing::debug;

use super::repository_variables;
use crate::api::GraphQlClient;

pub const REPOSITORY_SUMMARY_QUERY: &str = r#"
query repositorySummary($owner: String!, $name: String!, $since: GitTimestamp!) {
  repository(owner: $owner, name: $name) {
    totalCommits: defaultBranchRef {
      target {
        ... on Commit {
          history {
            totalCount
          }
        }
      }
    }
    windowCommits: defaultBranchRef {
      target {
        ... on Commit {
          history(since: $since) {
            totalCount
          }
        }
      }
    }
  }
}
"#;

pub struct RepositorySummaryFetcher {
    client: GraphQlClient,
}

impl RepositorySummaryFetcher {
    pub fn new(client: GraphQlClient) -> Self {
        Self { client }
    }

    /// Fetch the full and windowed commit counts of the default branch.
    /// A repository without a default branch reports zeros.
    pub async fn fetch(&self, id: &RepositoryId, since: DateTime<Utc>) -> PulseResult<CommitTotals> {
        let mut variables = repository_variables(id);
        variables.insert(
            "since".to_string(),
            json!(since.to_rfc3339_opts(SecondsFormat::Secs, true)),
        );

        let data = self.client.query(REPOSITORY_SUMMARY_QUERY, variables).await?;
        let totals = CommitTotals {
            total_commits: history_count(&data, "totalCommits"),
            trailing_year_commits: history_count(&data, "windowCommits"),
        };

        debug!(
            repository = %id,
            total = totals.total_commits,
            window = totals.trailing_year_commits,
            "Fetched commit totals"
        );

        Ok(totals)
    }
}

fn history_count(data: &Value, alias: &str) -> u64 {
    data.pointer(&format!("/repository/{}/target/history/totalCount", alias))
        .and_then(Value::as_u64)
        .unwrap_or(0)
}
