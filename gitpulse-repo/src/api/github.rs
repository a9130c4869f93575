//! REST client for repository metadata

use async_trait::async_trait;
use gitpulse_core::{ErrorContext, PulseError, PulseResult, RepositoryMetadata};
use serde::Deserialize;
use tracing::debug;

use super::{create_http_client, handle_response_error, ApiClientConfig, RepositoryApiClient};

/// Fetches `GET /repos/{owner}/{name}` for report enrichment
pub struct GitHubApiClient {
    client: reqwest::Client,
    config: ApiClientConfig,
}

/// Subset of the REST repository object the report uses
#[derive(Debug, Deserialize)]
struct RepositoryPayload {
    #[serde(default)]
    stargazers_count: u64,
    #[serde(default)]
    forks_count: u64,
    language: Option<String>,
    description: Option<String>,
}

impl From<RepositoryPayload> for RepositoryMetadata {
    fn from(repo: RepositoryPayload) -> Self {
        RepositoryMetadata {
            stars: repo.stargazers_count,
            forks: repo.forks_count,
            language: repo.language,
            description: repo.description,
        }
    }
}

impl GitHubApiClient {
    pub fn new(config: ApiClientConfig) -> PulseResult<Self> {
        let client = create_http_client(&config)?;

        debug!(base_url = %config.rest_url, "Created REST client");

        Ok(Self { client, config })
    }

    async fn get(&self, endpoint: &str) -> PulseResult<reqwest::Response> {
        let url = format!(
            "{}/{}",
            self.config.rest_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        );

        debug!(url = %url, "REST request");

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| PulseError::Protocol {
                message: format!("REST request to {} failed: {}", url, e),
                status: e.status().map(|s| s.as_u16()),
                source: Some(Box::new(e)),
                context: ErrorContext::new("rest_client").with_operation("get"),
            })?;

        if !response.status().is_success() {
            return Err(handle_response_error(response, "rest_get").await);
        }

        Ok(response)
    }
}

#[async_trait]
impl RepositoryApiClient for GitHubApiClient {
    async fn get_repository_metadata(
        &self,
        owner: &str,
        repo: &str,
    ) -> PulseResult<RepositoryMetadata> {
        let response = self.get(&format!("repos/{}/{}", owner, repo)).await?;

        let payload: RepositoryPayload =
            response.json().await.map_err(|e| PulseError::Protocol {
                message: format!("repository payload for {}/{} did not decode: {}", owner, repo, e),
                status: None,
                source: Some(Box::new(e)),
                context: ErrorContext::new("rest_client")
                    .with_operation("get_repository_metadata"),
            })?;

        Ok(payload.into())
    }
}
