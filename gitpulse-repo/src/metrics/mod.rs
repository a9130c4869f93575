//! Remote metrics aggregation
//!
//! Each aggregator owns its query document and turns server responses into
//! one of the summary types from `gitpulse_core`.

pub mod commits;
pub mod pulls;
pub mod summary;

pub use commits::ContributorAggregator;
pub use pulls::{review_statistics, PullRequestAggregator, ReviewStatistics};
pub use summary::RepositorySummaryFetcher;

use gitpulse_core::RepositoryId;
use serde_json::{json, Map, Value};

/// `$owner` and `$name` variables shared by every repository query
pub(crate) fn repository_variables(id: &RepositoryId) -> Map<String, Value> {
    let mut variables = Map::new();
    variables.insert("owner".to_string(), json!(id.owner()));
    variables.insert("name".to_string(), json!(id.name()));
    variables
}

/// Round to two decimal places
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(round2(2.0 / 3.0), 0.67);
        assert_eq!(round2(0.125), 0.13);
        assert_eq!(round2(1.0), 1.0);
    }

    #[test]
    fn variables_carry_owner_and_name() {
        let id = RepositoryId::parse("rust-lang/cargo").unwrap();
        let vars = repository_variables(&id);
        assert_eq!(vars["owner"], "rust-lang");
        assert_eq!(vars["name"], "cargo");
    }
}
