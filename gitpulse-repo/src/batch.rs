//! Bounded-concurrency batch runs

use gitpulse_core::{performance::Stopwatch, process_concurrently, RepositoryResult};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

use crate::orchestrator::RepositoryAnalyzer;

/// Split a newline-delimited repository list, dropping blank lines
pub fn parse_repository_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Fans repositories out over a bounded worker pool
pub struct BatchCoordinator {
    analyzer: Arc<RepositoryAnalyzer>,
    max_workers: usize,
}

impl BatchCoordinator {
    pub fn new(analyzer: Arc<RepositoryAnalyzer>, max_workers: usize) -> Self {
        Self {
            analyzer,
            max_workers: max_workers.max(1),
        }
    }

    /// Analyze every entry with at most `max_workers` in flight.
    ///
    /// Produces exactly one result per entry, in input order. A worker that
    /// panics becomes a failure result for its entry.
    pub async fn run(&self, entries: Vec<String>) -> Vec<RepositoryResult> {
        info!(
            repositories = entries.len(),
            workers = self.max_workers,
            "Starting batch"
        );

        let watch = Stopwatch::start("batch");
        let indexed: Vec<(usize, String)> = entries.into_iter().enumerate().collect();
        let analyzer = self.analyzer.clone();

        let mut completed = process_concurrently(indexed, self.max_workers, move |(_, line)| {
            let analyzer = analyzer.clone();
            async move { analyzer.analyze(&line).await }
        })
        .await;

        completed.sort_by_key(|((index, _), _)| *index);

        let results: Vec<RepositoryResult> = completed
            .into_iter()
            .map(|((_, line), outcome)| match outcome {
                Ok(result) => result,
                Err(e) => {
                    error!(repository = %line, error = %e, "Worker failed");
                    RepositoryResult::failure(line.trim(), e)
                }
            })
            .collect();

        let outcome = BatchOutcome::new(&results);
        info!(
            succeeded = outcome.succeeded,
            failed = outcome.failed,
            elapsed_ms = watch.finish().as_millis() as u64,
            "Batch finished"
        );

        results
    }
}

/// Success and failure counts over a finished batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub succeeded: usize,
    pub failed: usize,
    /// `(repository, error)` for every failure, in result order
    pub failures: Vec<(String, String)>,
}

impl BatchOutcome {
    pub fn new(results: &[RepositoryResult]) -> Self {
        let mut outcome = Self::default();
        for result in results {
            match result.error_message() {
                None => outcome.succeeded += 1,
                Some(message) => {
                    outcome.failed += 1;
                    outcome
                        .failures
                        .push((result.repository().to_string(), message.to_string()));
                }
            }
        }
        outcome
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}
