//! gitpulse CLI - batch analytics for GitHub repositories
//!
//! Reads a newline-delimited list of `owner/name` repositories, analyzes them
//! concurrently and writes every result as JSON.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use gitpulse_core::{init_logging, LogFormat, LoggingConfig, PulseConfig, RepositoryResult};
use gitpulse_repo::{
    parse_repository_list, ApiClientConfig, BatchCoordinator, BatchOutcome, GitCommandCloner,
    GitHubApiClient, GraphQlClient, HttpGraphQlTransport, RepositoryAnalyzer, WorkspaceManager,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "gitpulse")]
#[command(about = "Collect activity and code volume metrics for GitHub repositories")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze every repository listed in a file
    Analyze {
        /// File with one `owner/name` per line
        repos: PathBuf,

        /// GitHub token (falls back to GITHUB_TOKEN)
        #[arg(short, long)]
        token: Option<String>,

        /// Where to write the JSON results
        #[arg(short, long, default_value = "results.json")]
        output: PathBuf,

        /// Maximum repositories analyzed at once
        #[arg(short, long)]
        workers: Option<usize>,

        /// Skip REST metadata enrichment
        #[arg(long)]
        no_metadata: bool,
    },

    /// Manage configuration
    Config {
        /// Show the effective configuration
        #[arg(long)]
        show: bool,

        /// Write a default configuration file
        #[arg(long)]
        init: bool,

        /// Validate the effective configuration
        #[arg(long)]
        validate: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut logging_config = LoggingConfig::default();
    if cli.verbose {
        logging_config = logging_config.verbose();
    }
    if cli.json_logs {
        logging_config.format = LogFormat::Json;
    }
    init_logging(&logging_config)
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;

    info!("Starting gitpulse v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Analyze {
            repos,
            token,
            output,
            workers,
            no_metadata,
        } => handle_analyze(config, repos, token, output, workers, no_metadata).await,
        Commands::Config {
            show,
            init,
            validate,
        } => handle_config(&config, show, init, validate),
    }
}

fn load_config(config_path: Option<&Path>) -> anyhow::Result<PulseConfig> {
    if let Some(path) = config_path {
        info!("Loading configuration from {:?}", path);
        return PulseConfig::from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()));
    }

    let default_paths = [
        dirs::config_dir().map(|d| d.join("gitpulse").join("config.toml")),
        dirs::home_dir().map(|d| d.join(".gitpulse").join("config.toml")),
        Some(PathBuf::from("gitpulse.toml")),
    ];

    for path in default_paths.iter().flatten() {
        if path.exists() {
            info!("Loading configuration from {:?}", path);
            return PulseConfig::from_file(path)
                .with_context(|| format!("failed to load configuration from {}", path.display()));
        }
    }

    info!("No configuration file found, using defaults");
    Ok(PulseConfig::default())
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|d| d.join(".config")))
        .map(|d| d.join("gitpulse").join("config.toml"))
}

async fn handle_analyze(
    mut config: PulseConfig,
    repos: PathBuf,
    token: Option<String>,
    output: PathBuf,
    workers: Option<usize>,
    no_metadata: bool,
) -> anyhow::Result<()> {
    if let Some(workers) = workers {
        config.batch.max_workers = workers;
    }
    config.validate().context("invalid configuration")?;

    let token = match token.or_else(|| std::env::var("GITHUB_TOKEN").ok()) {
        Some(token) if !token.trim().is_empty() => token,
        _ => bail!("a GitHub token is required, pass --token or set GITHUB_TOKEN"),
    };

    let text = tokio::fs::read_to_string(&repos)
        .await
        .with_context(|| format!("failed to read repository list {}", repos.display()))?;
    let entries = parse_repository_list(&text);
    if entries.is_empty() {
        warn!(file = %repos.display(), "Repository list is empty");
    }

    let api_config = ApiClientConfig::from_settings(&config.api, Some(token.clone()));
    let transport = Arc::new(HttpGraphQlTransport::new(&api_config)?);
    let client = GraphQlClient::new(
        transport,
        Duration::from_millis(config.api.request_interval_ms),
    );

    let workspaces = Arc::new(WorkspaceManager::new(
        &config.clone,
        Some(token),
        Arc::new(GitCommandCloner::new(config.clone.depth)),
    ));

    let mut analyzer = RepositoryAnalyzer::new(client, workspaces.clone(), &config);
    if !no_metadata {
        analyzer = analyzer.with_metadata_client(Arc::new(GitHubApiClient::new(api_config)?));
    }

    let coordinator = BatchCoordinator::new(Arc::new(analyzer), config.batch.max_workers);

    let finished = tokio::select! {
        results = coordinator.run(entries) => Some(results),
        _ = tokio::signal::ctrl_c() => None,
    };

    let results = match finished {
        Some(results) => results,
        None => {
            warn!(path = %workspaces.run_dir().display(), "Interrupted, removing workspaces");
            workspaces.purge();
            bail!("interrupted before the batch finished");
        }
    };

    write_results(&output, &results).await?;
    print_summary(&results, &output);

    Ok(())
}

async fn write_results(output: &Path, results: &[RepositoryResult]) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(results)?;
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(output, json)
        .await
        .with_context(|| format!("failed to write results to {}", output.display()))?;
    info!(path = %output.display(), results = results.len(), "Results written");
    Ok(())
}

fn print_summary(results: &[RepositoryResult], output: &Path) {
    let outcome = BatchOutcome::new(results);

    println!("Analyzed {} repositories", outcome.total());
    println!("  succeeded: {}", outcome.succeeded);
    println!("  failed:    {}", outcome.failed);

    if !outcome.failures.is_empty() {
        println!();
        println!("Failures:");
        for (repository, error) in &outcome.failures {
            println!("  {}: {}", repository, error);
        }
    }

    println!();
    println!("Results saved to {}", output.display());
}

fn handle_config(config: &PulseConfig, show: bool, init: bool, validate: bool) -> anyhow::Result<()> {
    if init {
        let path = default_config_path().context("could not determine a configuration directory")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        PulseConfig::default().save_to_file(&path)?;
        println!("Configuration initialized at: {}", path.display());
    }

    if show {
        println!("{}", toml::to_string_pretty(config)?);
    }

    if validate {
        config.validate()?;
        println!("Configuration is valid");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_config_path_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gitpulse.toml");
        std::fs::write(&path, "[batch]\nmax_workers = 7\n").unwrap();

        let config = load_config(Some(path.as_path())).unwrap();
        assert_eq!(config.batch.max_workers, 7);
        assert_eq!(config.metrics.commit_page_cap, 10);
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(dir.path().join("absent.toml").as_path())).is_err());
    }

    #[tokio::test]
    async fn results_are_written_as_a_json_array() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out").join("results.json");
        let results = vec![RepositoryResult::failure("acme/ghost", "Clone error: failed")];

        write_results(&output, &results).await.unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(written[0]["repository"], "acme/ghost");
        assert_eq!(written[0]["error"], "Clone error: failed");
    }

    #[test]
    fn analyze_arguments_parse() {
        let cli = Cli::try_parse_from([
            "gitpulse", "analyze", "repos.txt", "--workers", "5", "-o", "out.json",
        ])
        .unwrap();

        match cli.command {
            Commands::Analyze {
                repos,
                workers,
                output,
                token,
                ..
            } => {
                assert_eq!(repos, PathBuf::from("repos.txt"));
                assert_eq!(workers, Some(5));
                assert_eq!(output, PathBuf::from("out.json"));
                assert!(token.is_none());
            }
            Commands::Config { .. } => panic!("expected analyze"),
        }
    }
}
