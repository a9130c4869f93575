//! Core data type definitions

use crate::error::{PulseError, PulseResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Repository identifier parsed from an `owner/name` token
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryId {
    owner: String,
    name: String,
}

impl RepositoryId {
    /// Parse an `owner/name` token. Surrounding whitespace is ignored; both
    /// parts must be non-empty and there must be exactly one separator.
    pub fn parse(input: &str) -> PulseResult<Self> {
        let trimmed = input.trim();
        let invalid = |reason: &str| PulseError::Parse {
            message: format!("invalid repository '{}': {}, use 'owner/name'", trimmed, reason),
            input: trimmed.to_string(),
        };

        let (owner, name) = trimmed
            .split_once('/')
            .ok_or_else(|| invalid("missing '/'"))?;

        if name.contains('/') {
            return Err(invalid("too many '/' separators"));
        }
        if owner.trim().is_empty() {
            return Err(invalid("empty owner"));
        }
        if name.trim().is_empty() {
            return Err(invalid("empty name"));
        }

        Ok(Self {
            owner: owner.trim().to_string(),
            name: name.trim().to_string(),
        })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl FromStr for RepositoryId {
    type Err = PulseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Lines-of-code statistics for one workspace
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeVolume {
    pub total_lines: u64,
    pub file_count: usize,
    /// Relative path (forward slashes) to non-blank line count, never zero
    pub per_file: BTreeMap<String, u64>,
}

impl CodeVolume {
    /// Record a counted file. Zero-line files are dropped so totals always
    /// equal the sum of `per_file`.
    pub fn record(&mut self, relative_path: String, lines: u64) {
        if lines == 0 {
            return;
        }
        if let Some(previous) = self.per_file.insert(relative_path, lines) {
            self.total_lines -= previous;
            self.file_count -= 1;
        }
        self.total_lines += lines;
        self.file_count += 1;
    }
}

/// Per-contributor commit totals
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributorStats {
    pub login: String,
    pub commits: u64,
    pub additions: u64,
    pub deletions: u64,
}

/// Contributor activity derived from the most recent default-branch commits
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContributorSummary {
    pub total_contributors: usize,
    pub active_30_days: usize,
    pub active_90_days: usize,
    pub top_contributors: Vec<ContributorStats>,
    pub commits_by_year: BTreeMap<i32, u64>,
    pub pages_fetched: usize,
    /// False when a failed page cut the history walk short
    pub complete: bool,
}

/// Pull request counts and review statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PullRequestSummary {
    pub total: u64,
    pub open: u64,
    pub closed: u64,
    pub merged: u64,
    pub draft: u64,
    pub reviews_per_pr: f64,
    pub approval_rate: f64,
    pub change_request_rate: f64,
}

/// Default-branch commit counts as reported by the server
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitTotals {
    pub total_commits: u64,
    pub trailing_year_commits: u64,
}

/// Supplementary repository metadata from the REST API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepositoryMetadata {
    pub stars: u64,
    pub forks: u64,
    pub language: Option<String>,
    pub description: Option<String>,
}

/// Merged record for a successfully analysed repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryReport {
    pub repository: String,
    pub commits: CommitTotals,
    pub contributors: ContributorSummary,
    pub pull_requests: PullRequestSummary,
    pub code: CodeVolume,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<RepositoryMetadata>,
}

/// Failure record for a repository that could not be analysed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryFailure {
    /// The identifier as given, or the raw input line when it did not parse
    pub repository: String,
    pub error: String,
}

/// One result per input line: either a report or a failure, never both
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RepositoryResult {
    Success(RepositoryReport),
    Failure(RepositoryFailure),
}

impl RepositoryResult {
    pub fn failure(repository: impl Into<String>, error: impl fmt::Display) -> Self {
        RepositoryResult::Failure(RepositoryFailure {
            repository: repository.into(),
            error: error.to_string(),
        })
    }

    pub fn repository(&self) -> &str {
        match self {
            RepositoryResult::Success(report) => &report.repository,
            RepositoryResult::Failure(failure) => &failure.repository,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RepositoryResult::Success(_))
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            RepositoryResult::Success(_) => None,
            RepositoryResult::Failure(failure) => Some(&failure.error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_owner_and_name() {
        let id = RepositoryId::parse("  acme/widgets \n").unwrap();
        assert_eq!(id.owner(), "acme");
        assert_eq!(id.name(), "widgets");
        assert_eq!(id.to_string(), "acme/widgets");
    }

    #[test]
    fn rejects_malformed_identifiers() {
        for input in ["acme", "/widgets", "acme/", "/", "acme/widgets/extra", "", " / "] {
            let err = RepositoryId::parse(input).unwrap_err();
            assert!(
                matches!(err, PulseError::Parse { .. }),
                "expected parse error for {:?}",
                input
            );
        }
    }

    #[test]
    fn code_volume_drops_empty_files() {
        let mut volume = CodeVolume::default();
        volume.record("main.py".to_string(), 12);
        volume.record("__init__.py".to_string(), 0);

        assert_eq!(volume.total_lines, 12);
        assert_eq!(volume.file_count, 1);
        assert!(!volume.per_file.contains_key("__init__.py"));
    }

    #[test]
    fn code_volume_replaces_duplicate_paths() {
        let mut volume = CodeVolume::default();
        volume.record("a.rs".to_string(), 3);
        volume.record("a.rs".to_string(), 5);

        assert_eq!(volume.total_lines, 5);
        assert_eq!(volume.file_count, 1);
        assert_eq!(volume.total_lines, volume.per_file.values().sum::<u64>());
    }

    #[test]
    fn failure_result_serializes_flat() {
        let result = RepositoryResult::failure("acme/ghost", "Clone error: failed to clone");
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["repository"], "acme/ghost");
        assert_eq!(json["error"], "Clone error: failed to clone");
        assert!(!result.is_success());
        assert_eq!(result.error_message(), Some("Clone error: failed to clone"));
    }
}
