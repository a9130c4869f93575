//! Pull request counts and review statistics

use gitpulse_core::{
    ErrorContext, MetricsConfig, PulseError, PulseResult, PullRequestSummary, RepositoryId,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{repository_variables, round2};
use crate::api::GraphQlClient;

pub const PULL_REQUEST_QUERY: &str = r#"
query pullRequestMetrics($owner: String!, $name: String!, $sampleSize: Int!, $reviewSample: Int!) {
  repository(owner: $owner, name: $name) {
    totalPRs: pullRequests {
      totalCount
    }
    openPRs: pullRequests(states: [OPEN]) {
      totalCount
    }
    closedPRs: pullRequests(states: [CLOSED]) {
      totalCount
    }
    mergedPRs: pullRequests(states: [MERGED]) {
      totalCount
    }
    draftPRs: pullRequests(first: $sampleSize, states: [OPEN]) {
      nodes {
        isDraft
      }
    }
    recentPRs: pullRequests(last: $sampleSize, states: [MERGED, CLOSED]) {
      nodes {
        reviews(first: $reviewSample) {
          totalCount
          nodes {
            state
          }
        }
      }
    }
  }
}
"#;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Count {
    #[serde(default)]
    total_count: u64,
}

#[derive(Debug, Deserialize)]
struct Nodes<T> {
    #[serde(default = "Vec::new")]
    nodes: Vec<T>,
}

impl<T> Default for Nodes<T> {
    fn default() -> Self {
        Self { nodes: Vec::new() }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DraftNode {
    #[serde(default)]
    is_draft: bool,
}

#[derive(Debug, Deserialize)]
struct ReviewedPullRequest {
    reviews: Option<ReviewConnection>,
}

/// Reviews attached to one pull request
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewConnection {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub nodes: Vec<Review>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Review {
    pub state: String,
}

#[derive(Debug, Deserialize)]
struct PullRequestData {
    #[serde(rename = "totalPRs", default)]
    total: Count,
    #[serde(rename = "openPRs", default)]
    open: Count,
    #[serde(rename = "closedPRs", default)]
    closed: Count,
    #[serde(rename = "mergedPRs", default)]
    merged: Count,
    #[serde(rename = "draftPRs", default)]
    drafts: Nodes<DraftNode>,
    #[serde(rename = "recentPRs", default)]
    recent: Nodes<ReviewedPullRequest>,
}

/// Review ratios over a sample of pull requests
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReviewStatistics {
    pub reviews_per_pr: f64,
    pub approval_rate: f64,
    pub change_request_rate: f64,
}

/// Compute review ratios.
///
/// `total_reviews` sums each pull request's review `total_count`, while
/// approvals and change requests are counted from the review nodes actually
/// returned. Every ratio is zero when its denominator is zero.
pub fn review_statistics<'a, I>(reviews: I) -> ReviewStatistics
where
    I: IntoIterator<Item = &'a ReviewConnection>,
{
    let mut reviewed_prs = 0u64;
    let mut total_reviews = 0u64;
    let mut approvals = 0u64;
    let mut change_requests = 0u64;

    for connection in reviews {
        if connection.total_count == 0 {
            continue;
        }
        reviewed_prs += 1;
        total_reviews += connection.total_count;
        for review in &connection.nodes {
            match review.state.as_str() {
                "APPROVED" => approvals += 1,
                "CHANGES_REQUESTED" => change_requests += 1,
                _ => {}
            }
        }
    }

    let ratio = |numerator: u64, denominator: u64| {
        if denominator == 0 {
            0.0
        } else {
            round2(numerator as f64 / denominator as f64)
        }
    };

    ReviewStatistics {
        reviews_per_pr: ratio(total_reviews, reviewed_prs),
        approval_rate: ratio(approvals, total_reviews),
        change_request_rate: ratio(change_requests, total_reviews),
    }
}

/// Runs the pull request metrics query for a repository
pub struct PullRequestAggregator {
    client: GraphQlClient,
    sample_size: u32,
    review_sample: u32,
}

impl PullRequestAggregator {
    pub fn new(client: GraphQlClient, config: &MetricsConfig) -> Self {
        Self {
            client,
            sample_size: config.pr_sample_size,
            review_sample: config.reviews_per_pr_sample,
        }
    }

    /// Totals come from the server's counts. Draft and review figures are
    /// computed over the sampled pull requests only.
    pub async fn aggregate(&self, id: &RepositoryId) -> PulseResult<PullRequestSummary> {
        let mut variables = repository_variables(id);
        variables.insert("sampleSize".to_string(), json!(self.sample_size));
        variables.insert("reviewSample".to_string(), json!(self.review_sample));

        let data = self.client.query(PULL_REQUEST_QUERY, variables).await?;
        let repository = match data.get("repository") {
            None | Some(Value::Null) => {
                debug!(repository = %id, "No repository in pull request response");
                return Ok(PullRequestSummary::default());
            }
            Some(repository) => repository.clone(),
        };

        let parsed: PullRequestData =
            serde_json::from_value(repository).map_err(|e| PulseError::Protocol {
                message: format!("unexpected pull request metrics shape: {}", e),
                status: None,
                source: Some(Box::new(e)),
                context: ErrorContext::new("pull_request_aggregator")
                    .with_operation("aggregate")
                    .with_metadata("repository", &id.to_string()),
            })?;

        let draft = parsed.drafts.nodes.iter().filter(|pr| pr.is_draft).count() as u64;
        let reviews: Vec<ReviewConnection> = parsed
            .recent
            .nodes
            .into_iter()
            .filter_map(|pr| pr.reviews)
            .collect();
        let stats = review_statistics(&reviews);

        debug!(
            repository = %id,
            total = parsed.total.total_count,
            sampled = reviews.len(),
            "Aggregated pull requests"
        );

        Ok(PullRequestSummary {
            total: parsed.total.total_count,
            open: parsed.open.total_count,
            closed: parsed.closed.total_count,
            merged: parsed.merged.total_count,
            draft,
            reviews_per_pr: stats.reviews_per_pr,
            approval_rate: stats.approval_rate,
            change_request_rate: stats.change_request_rate,
        })
    }
}
