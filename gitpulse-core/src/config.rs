//! Configuration management

use crate::error::{ErrorContext, PulseError, PulseResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseConfig {
    pub api: ApiConfig,
    pub clone: CloneConfig,
    pub scan: ScanConfig,
    pub metrics: MetricsConfig,
    pub batch: BatchConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub graphql_url: String,
    pub rest_url: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    pub user_agent: String,
    /// Minimum pause between consecutive requests of one paginated query
    pub request_interval_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            graphql_url: "https://api.github.com/graphql".to_string(),
            rest_url: "https://api.github.com".to_string(),
            timeout_seconds: 30,
            user_agent: format!("gitpulse/{}", env!("CARGO_PKG_VERSION")),
            request_interval_ms: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloneConfig {
    /// Host prefix for clone URLs
    pub base_url: String,
    pub timeout_seconds: u64,
    /// `None` clones full history
    pub depth: Option<u32>,
    /// Parent directory for ephemeral workspaces (system temp dir when unset)
    pub workspace_root: Option<PathBuf>,
}

impl Default for CloneConfig {
    fn default() -> Self {
        Self {
            base_url: "https://github.com".to_string(),
            timeout_seconds: 300,
            depth: None,
            workspace_root: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub excluded_dirs: Vec<String>,
    /// Lower-case extensions without the leading dot
    pub included_extensions: Vec<String>,
    /// Lower-case exact file names
    pub included_filenames: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            excluded_dirs: strings(&[
                ".git",
                "__pycache__",
                "node_modules",
                ".venv",
                "dist",
                "build",
            ]),
            included_extensions: strings(&[
                "py", "js", "ts", "jsx", "tsx", "java", "c", "cpp", "h", "hpp", "cs", "php",
                "rb", "go", "rs", "swift", "kt", "scala", "sh", "html", "css", "scss", "xml",
                "json", "yaml", "yml", "sql", "md", "txt", "dockerfile",
            ]),
            included_filenames: strings(&["makefile", "dockerfile"]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Hard ceiling on commit-history pages per repository
    pub commit_page_cap: usize,
    pub commit_page_size: u32,
    pub top_contributors: usize,
    /// Open and closed/merged PR sample size (GitHub caps this at 100)
    pub pr_sample_size: u32,
    pub reviews_per_pr_sample: u32,
    pub trailing_window_days: i64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            commit_page_cap: 10,
            commit_page_size: 100,
            top_contributors: 10,
            pr_sample_size: 100,
            reviews_per_pr_sample: 50,
            trailing_window_days: 365,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub max_workers: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { max_workers: 3 }
    }
}

impl PulseConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> PulseResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| PulseError::Config {
            message: format!("Failed to read config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("read_file")
                .with_suggestion("Check if the config file exists and is readable"),
        })?;

        let config: PulseConfig = toml::from_str(&content).map_err(|e| PulseError::Config {
            message: format!("Failed to parse config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("parse_toml")
                .with_suggestion("Check TOML syntax in config file"),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> PulseResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| PulseError::Config {
            message: format!("Failed to serialize config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config").with_operation("serialize_toml"),
        })?;

        std::fs::write(path, content).map_err(|e| PulseError::Config {
            message: format!("Failed to write config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("write_file")
                .with_suggestion("Check if the directory exists and is writable"),
        })?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> PulseResult<()> {
        let invalid = |message: &str, suggestion: &str| {
            Err(crate::config_error!(message, "config", suggestion))
        };

        if self.batch.max_workers == 0 {
            return invalid(
                "batch.max_workers must be greater than 0",
                "Set batch.max_workers to a small positive value such as 3",
            );
        }
        if self.metrics.commit_page_cap == 0 {
            return invalid(
                "metrics.commit_page_cap must be greater than 0",
                "Set metrics.commit_page_cap to a positive value",
            );
        }
        if self.metrics.commit_page_size == 0 || self.metrics.commit_page_size > 100 {
            return invalid(
                "metrics.commit_page_size must be between 1 and 100",
                "GitHub returns at most 100 nodes per page",
            );
        }
        if self.metrics.pr_sample_size == 0 || self.metrics.pr_sample_size > 100 {
            return invalid(
                "metrics.pr_sample_size must be between 1 and 100",
                "GitHub returns at most 100 nodes per page",
            );
        }
        if self.metrics.reviews_per_pr_sample == 0 || self.metrics.reviews_per_pr_sample > 100 {
            return invalid(
                "metrics.reviews_per_pr_sample must be between 1 and 100",
                "GitHub returns at most 100 nodes per page",
            );
        }
        if self.metrics.trailing_window_days <= 0 {
            return invalid(
                "metrics.trailing_window_days must be greater than 0",
                "Use 365 for a trailing year",
            );
        }
        if self.clone.timeout_seconds == 0 || self.api.timeout_seconds == 0 {
            return invalid(
                "timeouts must be greater than 0",
                "Set clone.timeout_seconds and api.timeout_seconds to positive values",
            );
        }

        Ok(())
    }
}
