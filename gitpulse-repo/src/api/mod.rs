//! API clients for the hosting platform
//!
//! The GraphQL executor drives all metric queries; the REST client only
//! supplies optional repository metadata.

use async_trait::async_trait;
use gitpulse_core::{ApiConfig, ErrorContext, PulseError, PulseResult, RepositoryMetadata};
use std::collections::HashMap;

pub mod github;
pub mod graphql;


pub use github::GitHubApiClient;
pub use graphql::{
    GraphQlClient, GraphQlRequest, GraphQlTransport, HttpGraphQlTransport, PageInfo, Paginator,
    QueryPage,
};

/// REST API version pinned on every request
pub const API_VERSION_HEADER: &str = "X-GitHub-Api-Version";
pub const API_VERSION: &str = "2022-11-28";

/// Configuration for HTTP API clients
#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    /// GraphQL endpoint
    pub graphql_url: String,
    /// Base URL for REST requests
    pub rest_url: String,
    /// Bearer credential
    pub access_token: Option<String>,
    pub timeout_seconds: u64,
    pub user_agent: String,
    /// Extra headers sent with every request
    pub headers: HashMap<String, String>,
}

impl Default for ApiClientConfig {
    fn default() -> Self {
        Self::from_settings(&ApiConfig::default(), None)
    }
}

impl ApiClientConfig {
    /// Build client configuration from the `[api]` config section
    pub fn from_settings(settings: &ApiConfig, access_token: Option<String>) -> Self {
        Self {
            graphql_url: settings.graphql_url.clone(),
            rest_url: settings.rest_url.clone(),
            access_token,
            timeout_seconds: settings.timeout_seconds,
            user_agent: settings.user_agent.clone(),
            headers: HashMap::new(),
        }
        .with_header(API_VERSION_HEADER.to_string(), API_VERSION.to_string())
    }

    pub fn with_header(mut self, key: String, value: String) -> Self {
        self.headers.insert(key, value);
        self
    }
}

/// Source of supplementary repository metadata
#[async_trait]
pub trait RepositoryApiClient: Send + Sync {
    async fn get_repository_metadata(
        &self,
        owner: &str,
        repo: &str,
    ) -> PulseResult<RepositoryMetadata>;
}

fn client_error(
    message: String,
    source: impl std::error::Error + Send + Sync + 'static,
) -> PulseError {
    PulseError::Config {
        message,
        source: Some(Box::new(source)),
        context: ErrorContext::new("http_client").with_operation("create_client"),
    }
}

/// Shared reqwest client: user agent, bearer token and extra headers
pub(crate) fn create_http_client(config: &ApiClientConfig) -> PulseResult<reqwest::Client> {
    let mut headers = reqwest::header::HeaderMap::new();

    headers.insert(
        reqwest::header::USER_AGENT,
        reqwest::header::HeaderValue::from_str(&config.user_agent)
            .map_err(|e| client_error(format!("Invalid user agent: {}", e), e))?,
    );

    if let Some(token) = &config.access_token {
        let mut value = reqwest::header::HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| client_error(format!("Invalid access token: {}", e), e))?;
        value.set_sensitive(true);
        headers.insert(reqwest::header::AUTHORIZATION, value);
    }

    for (key, value) in &config.headers {
        let header_name = reqwest::header::HeaderName::from_bytes(key.as_bytes())
            .map_err(|e| client_error(format!("Invalid header name '{}': {}", key, e), e))?;
        let header_value = reqwest::header::HeaderValue::from_str(value)
            .map_err(|e| client_error(format!("Invalid header value for '{}': {}", key, e), e))?;
        headers.insert(header_name, header_value);
    }

    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config.timeout_seconds))
        .default_headers(headers)
        .build()
        .map_err(|e| client_error(format!("Failed to create HTTP client: {}", e), e))
}

/// Longest slice of a failure body kept in error messages
const MAX_ERROR_BODY: usize = 200;

/// Convert a non-success HTTP response into `PulseError::Protocol`, keeping
/// GitHub's rate-limit headers as metadata.
pub(crate) async fn handle_response_error(
    response: reqwest::Response,
    operation: &str,
) -> PulseError {
    let status = response.status();
    let remaining = response
        .headers()
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let endpoint = response.url().path().to_string();

    let body = response.text().await.unwrap_or_default();
    let detail: String = match body.trim() {
        "" => status.canonical_reason().unwrap_or("no reason given").to_string(),
        trimmed => trimmed.chars().take(MAX_ERROR_BODY).collect(),
    };

    let suggestion = match status.as_u16() {
        401 => "The token was rejected, check GITHUB_TOKEN",
        403 | 429 if remaining.as_deref() == Some("0") => {
            "Rate limit exhausted, lower batch.max_workers or raise api.request_interval_ms"
        }
        403 => "The token lacks access to this repository",
        404 => "The repository does not exist or is private",
        _ => "Retry later, the API may be degraded",
    };

    let mut context = ErrorContext::new("api_client")
        .with_operation(operation)
        .with_metadata("endpoint", &endpoint)
        .with_suggestion(suggestion);
    if let Some(remaining) = &remaining {
        context = context.with_metadata("ratelimit_remaining", remaining);
    }

    PulseError::Protocol {
        message: format!("{} returned HTTP {}: {}", endpoint, status.as_u16(), detail),
        status: Some(status.as_u16()),
        source: None,
        context,
    }
}
