//! Ephemeral clone workspaces
//!
//! Each manager owns a run directory under the shared root, named from the
//! process id and a random run id. Every acquisition gets its own directory
//! inside it, named from an acquisition sequence number. The directory is
//! materialized by an external clone and removed when the `Workspace` drops.

use async_trait::async_trait;
use gitpulse_core::{
    clone_error, with_timeout, CloneConfig, ErrorContext, PulseError, PulseResult, RepositoryId,
};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info, warn};
use url::Url;

/// External operation that materializes a repository into a directory
#[async_trait]
pub trait CloneOperation: Send + Sync {
    async fn materialize(&self, source_url: &str, destination: &Path) -> PulseResult<()>;
}

/// Clones with the system `git` binary
#[derive(Debug, Clone, Default)]
pub struct GitCommandCloner {
    /// `None` clones full history
    pub depth: Option<u32>,
}

impl GitCommandCloner {
    pub fn new(depth: Option<u32>) -> Self {
        Self { depth }
    }
}

#[async_trait]
impl CloneOperation for GitCommandCloner {
    async fn materialize(&self, source_url: &str, destination: &Path) -> PulseResult<()> {
        let mut cmd = Command::new("git");
        cmd.arg("clone").arg("--quiet");

        if let Some(depth) = self.depth {
            cmd.arg("--depth").arg(depth.to_string());
            cmd.arg("--single-branch");
        }

        cmd.arg(source_url)
            .arg(destination)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = cmd.output().await.map_err(|e| {
            clone_error!(format!("failed to run git clone: {}", e), "git_cloner", e)
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(clone_error!(
                format!(
                    "git clone exited with {}: {}",
                    output.status,
                    redact(stderr.trim())
                ),
                "git_cloner"
            ));
        }

        Ok(())
    }
}

/// Strip credentials from anything that may echo a clone URL
fn redact(text: &str) -> String {
    let mut redacted = String::with_capacity(text.len());
    for (i, word) in text.split(' ').enumerate() {
        if i > 0 {
            redacted.push(' ');
        }
        let trimmed = word.trim_matches(|c| c == '\'' || c == '"');
        match Url::parse(trimmed) {
            Ok(mut url) if !url.username().is_empty() || url.password().is_some() => {
                let _ = url.set_username("");
                let _ = url.set_password(None);
                redacted.push_str(&word.replace(trimmed, url.as_str()));
            }
            _ => redacted.push_str(word),
        }
    }
    redacted
}

/// Hands out ephemeral, uniquely named clone directories
pub struct WorkspaceManager {
    run_dir: PathBuf,
    base_url: String,
    access_token: Option<String>,
    timeout_ms: u64,
    cloner: Arc<dyn CloneOperation>,
    sequence: AtomicU64,
}

impl WorkspaceManager {
    pub fn new(
        config: &CloneConfig,
        access_token: Option<String>,
        cloner: Arc<dyn CloneOperation>,
    ) -> Self {
        let root = config
            .workspace_root
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("gitpulse"));
        let run_id = uuid::Uuid::new_v4().simple().to_string();
        let run_dir = root.join(format!("run-{}-{}", std::process::id(), &run_id[..12]));

        Self {
            run_dir,
            base_url: config.base_url.clone(),
            access_token,
            timeout_ms: config.timeout_seconds.saturating_mul(1000),
            cloner,
            sequence: AtomicU64::new(0),
        }
    }

    /// Directory holding this manager's workspaces
    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Clone URL for a repository, with the credential embedded when present
    pub fn clone_url(&self, id: &RepositoryId) -> PulseResult<Url> {
        let raw = format!(
            "{}/{}/{}.git",
            self.base_url.trim_end_matches('/'),
            id.owner(),
            id.name()
        );
        let mut url = Url::parse(&raw).map_err(|e| PulseError::Config {
            message: format!("invalid clone URL '{}': {}", raw, e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("workspace_manager").with_operation("clone_url"),
        })?;

        if let Some(token) = &self.access_token {
            if url.scheme().starts_with("http") {
                let _ = url.set_username("x-access-token");
                let _ = url.set_password(Some(token));
            }
        }

        Ok(url)
    }

    fn next_path(&self) -> PathBuf {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        self.run_dir.join(format!("ws-{}", seq))
    }

    /// Acquire a fresh workspace holding a clone of `id`.
    ///
    /// On failure or timeout the directory is removed and a `Clone` error is
    /// returned.
    pub async fn acquire(&self, id: &RepositoryId) -> PulseResult<Workspace> {
        let path = self.next_path();

        if path.exists() {
            debug!(path = %path.display(), "Removing stale workspace");
            tokio::fs::remove_dir_all(&path).await?;
        }
        tokio::fs::create_dir_all(&self.run_dir).await?;

        // Owns the directory from here on, so every early return cleans up.
        let workspace = Workspace { path };

        let url = self.clone_url(id)?;
        let display_url = redact(url.as_str());
        info!(
            repository = %id,
            url = %display_url,
            path = %workspace.path.display(),
            "Cloning repository"
        );

        let operation = format!("clone {}", id);
        let outcome = with_timeout(
            self.cloner.materialize(url.as_str(), &workspace.path),
            self.timeout_ms,
            &operation,
        )
        .await;

        match outcome {
            Ok(Ok(())) => Ok(workspace),
            Ok(Err(PulseError::Clone {
                message,
                source,
                context,
            })) => Err(PulseError::Clone {
                message: format!("failed to clone {}: {}", id, message),
                source,
                context,
            }),
            Ok(Err(other)) => Err(PulseError::Clone {
                message: format!("failed to clone {}: {}", id, other),
                source: Some(Box::new(other)),
                context: ErrorContext::new("workspace_manager").with_operation("acquire"),
            }),
            Err(timeout) => Err(PulseError::Clone {
                message: format!(
                    "failed to clone {}: timed out after {}s",
                    id,
                    self.timeout_ms / 1000
                ),
                source: Some(Box::new(timeout)),
                context: ErrorContext::new("workspace_manager")
                    .with_operation("acquire")
                    .with_suggestion("Increase clone.timeout_seconds or use a shallow clone"),
            }),
        }
    }

    /// Remove this manager's run directory. Used after an interrupt.
    /// Workspaces of other managers sharing the root are left alone.
    pub fn purge(&self) {
        remove_best_effort(&self.run_dir);
    }
}

/// An exclusive clone directory, removed on drop
#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
}

impl Workspace {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        remove_best_effort(&self.path);
    }
}

fn remove_best_effort(path: &Path) {
    match std::fs::remove_dir_all(path) {
        Ok(()) => debug!(path = %path.display(), "Removed workspace"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Could not remove workspace"),
    }
}
