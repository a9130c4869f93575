//! Per-repository analysis pipeline
//!
//! Runs the remote metric queries, clones the repository into a fresh
//! workspace, scans it and merges everything into one `RepositoryResult`.
//! Stages run strictly in order for a single repository.

use chrono::{DateTime, Duration, Utc};
use gitpulse_core::{
    log_operation_error, log_operation_start, log_operation_success, performance, PulseConfig,
    RepositoryId, RepositoryMetadata, RepositoryReport, RepositoryResult,
};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::api::{GraphQlClient, RepositoryApiClient};
use crate::metrics::{ContributorAggregator, PullRequestAggregator, RepositorySummaryFetcher};
use crate::scanner::CodeScanner;
use crate::workspace::WorkspaceManager;

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisStage {
    ParseId,
    FetchPullRequests,
    FetchContributors,
    FetchSummary,
    FetchMetadata,
    Clone,
    ScanCode,
    Merge,
    Done,
}

impl AnalysisStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStage::ParseId => "parse_id",
            AnalysisStage::FetchPullRequests => "fetch_pull_requests",
            AnalysisStage::FetchContributors => "fetch_contributors",
            AnalysisStage::FetchSummary => "fetch_summary",
            AnalysisStage::FetchMetadata => "fetch_metadata",
            AnalysisStage::Clone => "clone",
            AnalysisStage::ScanCode => "scan_code",
            AnalysisStage::Merge => "merge",
            AnalysisStage::Done => "done",
        }
    }
}

impl fmt::Display for AnalysisStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn enter(repository: &str, stage: AnalysisStage) {
    debug!(repository, stage = %stage, "Entering stage");
}

/// Analyzes one repository end to end
pub struct RepositoryAnalyzer {
    pull_requests: PullRequestAggregator,
    contributors: ContributorAggregator,
    summary: RepositorySummaryFetcher,
    metadata: Option<Arc<dyn RepositoryApiClient>>,
    workspaces: Arc<WorkspaceManager>,
    scanner: CodeScanner,
    trailing_window_days: i64,
}

impl RepositoryAnalyzer {
    pub fn new(client: GraphQlClient, workspaces: Arc<WorkspaceManager>, config: &PulseConfig) -> Self {
        Self {
            pull_requests: PullRequestAggregator::new(client.clone(), &config.metrics),
            contributors: ContributorAggregator::new(client.clone(), &config.metrics),
            summary: RepositorySummaryFetcher::new(client),
            metadata: None,
            workspaces,
            scanner: CodeScanner::new(&config.scan),
            trailing_window_days: config.metrics.trailing_window_days,
        }
    }

    /// Enrich reports with REST metadata
    pub fn with_metadata_client(mut self, client: Arc<dyn RepositoryApiClient>) -> Self {
        self.metadata = Some(client);
        self
    }

    /// Analyze one input line. Never fails: every problem ends up in the
    /// returned result.
    pub async fn analyze(&self, line: &str) -> RepositoryResult {
        self.analyze_at(line, Utc::now()).await
    }

    /// Same as [`analyze`](Self::analyze) with an explicit reference time for
    /// the activity windows
    pub async fn analyze_at(&self, line: &str, now: DateTime<Utc>) -> RepositoryResult {
        let raw = line.trim();
        enter(raw, AnalysisStage::ParseId);
        let id = match RepositoryId::parse(raw) {
            Ok(id) => id,
            Err(e) => {
                warn!(input = raw, error = %e, "Skipping malformed repository");
                return RepositoryResult::failure(raw, e);
            }
        };
        let name = id.to_string();

        log_operation_start!("analyze_repository", repository = %name);

        enter(&name, AnalysisStage::FetchPullRequests);
        let pull_requests = self.pull_requests.aggregate(&id).await.unwrap_or_else(|e| {
            warn!(repository = %name, error = %e, "Pull request metrics unavailable");
            Default::default()
        });

        enter(&name, AnalysisStage::FetchContributors);
        let contributors = self.contributors.aggregate(&id, now).await;

        enter(&name, AnalysisStage::FetchSummary);
        let since = now - Duration::days(self.trailing_window_days);
        let commits = self.summary.fetch(&id, since).await.unwrap_or_else(|e| {
            warn!(repository = %name, error = %e, "Commit totals unavailable");
            Default::default()
        });

        enter(&name, AnalysisStage::FetchMetadata);
        let metadata = self.fetch_metadata(&id).await;

        enter(&name, AnalysisStage::Clone);
        let workspace = match self.workspaces.acquire(&id).await {
            Ok(workspace) => workspace,
            Err(e) => {
                log_operation_error!("analyze_repository", e, repository = %name);
                return RepositoryResult::failure(name, e);
            }
        };

        enter(&name, AnalysisStage::ScanCode);
        let scanner = self.scanner.clone();
        // The workspace moves into the blocking task so its recursive
        // removal runs there as well.
        let scanned = performance::measure_async(
            "scan_code",
            tokio::task::spawn_blocking(move || {
                let code = scanner.scan(workspace.path());
                drop(workspace);
                code
            }),
        )
        .await;

        let code = match scanned {
            Ok(code) => code,
            Err(e) => {
                log_operation_error!("analyze_repository", e, repository = %name);
                return RepositoryResult::failure(name, format!("code scan did not complete: {}", e));
            }
        };

        enter(&name, AnalysisStage::Merge);
        let report = RepositoryReport {
            repository: name.clone(),
            commits,
            contributors,
            pull_requests,
            code,
            metadata,
        };

        enter(&name, AnalysisStage::Done);
        log_operation_success!(
            "analyze_repository",
            repository = %name,
            lines = report.code.total_lines,
            contributors = report.contributors.total_contributors
        );

        RepositoryResult::Success(report)
    }

    async fn fetch_metadata(&self, id: &RepositoryId) -> Option<RepositoryMetadata> {
        let client = self.metadata.as_ref()?;
        match client.get_repository_metadata(id.owner(), id.name()).await {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                debug!(repository = %id, error = %e, "Repository metadata unavailable");
                None
            }
        }
    }
}
