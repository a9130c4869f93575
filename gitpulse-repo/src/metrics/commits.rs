//! Contributor activity from default-branch commit history

use chrono::{DateTime, Datelike, Duration, Utc};
use gitpulse_core::{ContributorStats, ContributorSummary, MetricsConfig, RepositoryId};
use serde::Deserialize;
use serde_json::json;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, warn};

use super::repository_variables;
use crate::api::GraphQlClient;

pub const COMMIT_HISTORY_QUERY: &str = r#"
query commitHistory($owner: String!, $name: String!, $cursor: String, $pageSize: Int!) {
  repository(owner: $owner, name: $name) {
    defaultBranchRef {
      target {
        ... on Commit {
          history(first: $pageSize, after: $cursor) {
            pageInfo {
              hasNextPage
              endCursor
            }
            nodes {
              committedDate
              additions
              deletions
              author {
                user {
                  login
                }
              }
            }
          }
        }
      }
    }
  }
}
"#;

const HISTORY_POINTER: &str = "/repository/defaultBranchRef/target/history";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommitNode {
    committed_date: DateTime<Utc>,
    additions: Option<u64>,
    deletions: Option<u64>,
    author: Option<CommitAuthor>,
}

#[derive(Debug, Deserialize)]
struct CommitAuthor {
    user: Option<CommitUser>,
}

#[derive(Debug, Deserialize)]
struct CommitUser {
    login: String,
}

impl CommitNode {
    fn login(&self) -> Option<&str> {
        self.author
            .as_ref()
            .and_then(|author| author.user.as_ref())
            .map(|user| user.login.as_str())
    }
}

/// Running totals across accepted pages
struct ContributorTally {
    contributors: Vec<ContributorStats>,
    index: HashMap<String, usize>,
    active_30: HashSet<String>,
    active_90: HashSet<String>,
    by_year: BTreeMap<i32, u64>,
    since_30: DateTime<Utc>,
    since_90: DateTime<Utc>,
}

impl ContributorTally {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            contributors: Vec::new(),
            index: HashMap::new(),
            active_30: HashSet::new(),
            active_90: HashSet::new(),
            by_year: BTreeMap::new(),
            since_30: now - Duration::days(30),
            since_90: now - Duration::days(90),
        }
    }

    /// Commits without a linked user account are ignored
    fn add_page(&mut self, commits: &[CommitNode]) {
        for commit in commits {
            let Some(login) = commit.login() else {
                continue;
            };

            let slot = match self.index.get(login) {
                Some(&slot) => slot,
                None => {
                    self.index.insert(login.to_string(), self.contributors.len());
                    self.contributors.push(ContributorStats {
                        login: login.to_string(),
                        commits: 0,
                        additions: 0,
                        deletions: 0,
                    });
                    self.contributors.len() - 1
                }
            };

            let stats = &mut self.contributors[slot];
            stats.commits += 1;
            stats.additions += commit.additions.unwrap_or(0);
            stats.deletions += commit.deletions.unwrap_or(0);

            if commit.committed_date > self.since_30 {
                self.active_30.insert(login.to_string());
            }
            if commit.committed_date > self.since_90 {
                self.active_90.insert(login.to_string());
            }
            *self.by_year.entry(commit.committed_date.year()).or_insert(0) += 1;
        }
    }

    fn finish(self, top: usize, pages_fetched: usize, complete: bool) -> ContributorSummary {
        let total_contributors = self.contributors.len();
        let mut ranked = self.contributors;
        // Stable: equal commit counts keep first-seen order
        ranked.sort_by(|a, b| b.commits.cmp(&a.commits));
        ranked.truncate(top);

        ContributorSummary {
            total_contributors,
            active_30_days: self.active_30.len(),
            active_90_days: self.active_90.len(),
            top_contributors: ranked,
            commits_by_year: self.by_year,
            pages_fetched,
            complete,
        }
    }
}

/// Walks commit history pages and summarizes contributor activity
pub struct ContributorAggregator {
    client: GraphQlClient,
    page_cap: usize,
    page_size: u32,
    top_contributors: usize,
}

impl ContributorAggregator {
    pub fn new(client: GraphQlClient, config: &MetricsConfig) -> Self {
        Self {
            client,
            page_cap: config.commit_page_cap,
            page_size: config.commit_page_size,
            top_contributors: config.top_contributors,
        }
    }

    /// Aggregate at most `page_cap` pages of history.
    ///
    /// Never fails: a failing page ends the walk, keeps what earlier pages
    /// contributed and marks the summary incomplete.
    pub async fn aggregate(&self, id: &RepositoryId, now: DateTime<Utc>) -> ContributorSummary {
        let mut variables = repository_variables(id);
        variables.insert("pageSize".to_string(), json!(self.page_size));

        let mut pages = self
            .client
            .paginate(COMMIT_HISTORY_QUERY, variables, HISTORY_POINTER);
        let mut tally = ContributorTally::new(now);
        let mut complete = true;

        while pages.pages_fetched() < self.page_cap {
            let page = match pages.next_page().await {
                None => break,
                Some(Ok(page)) => page,
                Some(Err(e)) => {
                    warn!(repository = %id, page = pages.pages_fetched(), error = %e, "Commit history walk stopped");
                    complete = false;
                    break;
                }
            };

            // Only a fully decoded page is counted
            match page.nodes::<CommitNode>() {
                Ok(commits) => tally.add_page(&commits),
                Err(e) => {
                    warn!(repository = %id, page = page.index, error = %e, "Discarding malformed commit page");
                    complete = false;
                    break;
                }
            }
        }

        if !pages.is_finished() && complete {
            debug!(repository = %id, cap = self.page_cap, "Commit page cap reached");
        }

        tally.finish(self.top_contributors, pages.pages_fetched(), complete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn commit(login: Option<&str>, date: DateTime<Utc>, additions: u64) -> CommitNode {
        CommitNode {
            committed_date: date,
            additions: Some(additions),
            deletions: None,
            author: Some(CommitAuthor {
                user: login.map(|login| CommitUser {
                    login: login.to_string(),
                }),
            }),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn windows_are_exclusive_of_the_boundary() {
        let mut tally = ContributorTally::new(now());
        tally.add_page(&[
            commit(Some("edge"), now() - Duration::days(30), 1),
            commit(Some("recent"), now() - Duration::days(29), 1),
            commit(Some("older"), now() - Duration::days(60), 1),
        ]);
        let summary = tally.finish(10, 1, true);

        assert_eq!(summary.active_30_days, 1);
        assert_eq!(summary.active_90_days, 3);
    }

    #[test]
    fn unattributed_commits_are_skipped() {
        let mut tally = ContributorTally::new(now());
        tally.add_page(&[
            commit(None, now(), 10),
            CommitNode {
                committed_date: now(),
                additions: None,
                deletions: None,
                author: None,
            },
            commit(Some("alice"), now(), 5),
        ]);
        let summary = tally.finish(10, 1, true);

        assert_eq!(summary.total_contributors, 1);
        assert_eq!(summary.commits_by_year.get(&2024), Some(&1));
        assert_eq!(summary.top_contributors[0].additions, 5);
    }

    #[test]
    fn ranking_is_stable_and_truncated() {
        let mut tally = ContributorTally::new(now());
        let day = |y, m| Utc.with_ymd_and_hms(y, m, 1, 0, 0, 0).unwrap();
        tally.add_page(&[
            commit(Some("carol"), day(2022, 3), 1),
            commit(Some("bob"), day(2023, 1), 1),
            commit(Some("alice"), day(2023, 5), 1),
            commit(Some("alice"), day(2023, 6), 1),
            commit(Some("dave"), day(2023, 7), 1),
        ]);
        let summary = tally.finish(3, 1, true);

        let logins: Vec<&str> = summary
            .top_contributors
            .iter()
            .map(|c| c.login.as_str())
            .collect();
        assert_eq!(logins, vec!["alice", "carol", "bob"]);
        assert_eq!(summary.total_contributors, 4);
        assert_eq!(
            summary.commits_by_year.into_iter().collect::<Vec<_>>(),
            vec![(2022, 1), (2023, 4)]
        );
    }

    #[test]
    fn decodes_server_commit_nodes() {
        let node: CommitNode = serde_json::from_value(json!({
            "committedDate": "2024-05-20T10:00:00Z",
            "additions": 12,
            "deletions": 3,
            "author": {"user": {"login": "alice"}}
        }))
        .unwrap();
        assert_eq!(node.login(), Some("alice"));
        assert_eq!(node.committed_date.year(), 2024);

        let ghost: CommitNode = serde_json::from_value(json!({
            "committedDate": "2024-05-20T10:00:00Z",
            "additions": null,
            "deletions": null,
            "author": {"user": null}
        }))
        .unwrap();
        assert_eq!(ghost.login(), None);
    }
}
