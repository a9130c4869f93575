//! Shared test doubles for the analysis pipeline
//!
//! `ScriptedTransport` answers GraphQL requests from per-query scripts and
//! `FakeCloner` materializes fixed file trees instead of running git.

#![allow(dead_code)]

use async_trait::async_trait;
use gitpulse_core::{clone_error, PulseConfig, PulseResult};
use gitpulse_repo::{
    CloneOperation, GraphQlClient, GraphQlRequest, GraphQlTransport, RepositoryAnalyzer,
    WorkspaceManager,
};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

static INIT: Once = Once::new();

/// Initialize logging for tests
pub fn init_logging() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("gitpulse=debug,info")
            .with_test_writer()
            .try_init();
    });
}

/// Which query document a request carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    PullRequests,
    CommitHistory,
    Summary,
}

impl QueryKind {
    fn of(request: &GraphQlRequest) -> Option<Self> {
        if request.query.contains("pullRequestMetrics") {
            Some(QueryKind::PullRequests)
        } else if request.query.contains("commitHistory") {
            Some(QueryKind::CommitHistory)
        } else if request.query.contains("repositorySummary") {
            Some(QueryKind::Summary)
        } else {
            None
        }
    }
}

/// Replays scripted bodies per query kind. Unscripted requests get an empty
/// repository, which every aggregator treats as zeros.
#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<QueryKind, VecDeque<PulseResult<Value>>>>,
    requests: Mutex<Vec<GraphQlRequest>>,
    calls: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(self: &Arc<Self>, kind: QueryKind, response: PulseResult<Value>) -> Arc<Self> {
        self.scripts
            .lock()
            .unwrap()
            .entry(kind)
            .or_default()
            .push_back(response);
        self.clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests_of(&self, kind: QueryKind) -> Vec<GraphQlRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|request| QueryKind::of(request) == Some(kind))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl GraphQlTransport for ScriptedTransport {
    async fn send(&self, request: &GraphQlRequest) -> PulseResult<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        let scripted = QueryKind::of(request).and_then(|kind| {
            self.scripts
                .lock()
                .unwrap()
                .get_mut(&kind)
                .and_then(VecDeque::pop_front)
        });

        scripted.unwrap_or_else(|| Ok(json!({"data": {"repository": null}})))
    }
}

/// Writes a fixed file tree, or fails, instead of cloning
pub struct FakeCloner {
    files: Vec<(String, String)>,
    fail_with: Option<String>,
    /// Only fail clones whose URL contains this fragment
    fail_only: Option<String>,
    pub clones: AtomicUsize,
    pub destinations: Mutex<Vec<PathBuf>>,
}

impl FakeCloner {
    pub fn with_files(files: &[(&str, &str)]) -> Arc<Self> {
        Arc::new(Self {
            files: files
                .iter()
                .map(|(path, body)| (path.to_string(), body.to_string()))
                .collect(),
            fail_with: None,
            fail_only: None,
            clones: AtomicUsize::new(0),
            destinations: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            files: Vec::new(),
            fail_with: Some(message.to_string()),
            fail_only: None,
            clones: AtomicUsize::new(0),
            destinations: Mutex::new(Vec::new()),
        })
    }

    /// Fail only the clone of `repository`, materialize `files` otherwise
    pub fn failing_for(repository: &str, files: &[(&str, &str)]) -> Arc<Self> {
        Arc::new(Self {
            files: files
                .iter()
                .map(|(path, body)| (path.to_string(), body.to_string()))
                .collect(),
            fail_with: Some(format!("could not read from {}", repository)),
            fail_only: Some(format!("/{}.git", repository)),
            clones: AtomicUsize::new(0),
            destinations: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl CloneOperation for FakeCloner {
    async fn materialize(&self, source_url: &str, destination: &Path) -> PulseResult<()> {
        self.clones.fetch_add(1, Ordering::SeqCst);
        self.destinations
            .lock()
            .unwrap()
            .push(destination.to_path_buf());

        if let Some(message) = &self.fail_with {
            let targeted = match &self.fail_only {
                Some(fragment) => source_url.contains(fragment.as_str()),
                None => true,
            };
            if targeted {
                return Err(clone_error!(message.clone(), "fake_cloner"));
            }
        }

        tokio::fs::create_dir_all(destination).await?;
        for (relative, body) in &self.files {
            let path = destination.join(relative);
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(path, body).await?;
        }
        Ok(())
    }
}

/// Analyzer wired to test doubles with the workspace root under `root`
pub fn analyzer(
    transport: Arc<ScriptedTransport>,
    cloner: Arc<FakeCloner>,
    root: &Path,
) -> RepositoryAnalyzer {
    init_logging();

    let mut config = PulseConfig::default();
    config.clone.workspace_root = Some(root.to_path_buf());

    let client = GraphQlClient::new(transport, Duration::ZERO);
    let workspaces = Arc::new(WorkspaceManager::new(&config.clone, None, cloner));
    RepositoryAnalyzer::new(client, workspaces, &config)
}

/// Workspace directories left under `root`, across every run directory
pub fn leftover_workspaces(root: &Path) -> usize {
    std::fs::read_dir(root)
        .unwrap()
        .map(|run| std::fs::read_dir(run.unwrap().path()).unwrap().count())
        .sum()
}

/// A commit history page body
pub fn commit_page(commits: &[(&str, &str)], next_cursor: Option<&str>) -> PulseResult<Value> {
    let nodes: Vec<Value> = commits
        .iter()
        .map(|(login, date)| {
            json!({
                "committedDate": date,
                "additions": 10,
                "deletions": 2,
                "author": {"user": {"login": login}}
            })
        })
        .collect();

    Ok(json!({"data": {"repository": {"defaultBranchRef": {"target": {"history": {
        "pageInfo": {"hasNextPage": next_cursor.is_some(), "endCursor": next_cursor},
        "nodes": nodes
    }}}}}}))
}
