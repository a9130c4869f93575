//! GraphQL query executor
//!
//! Sends query documents to the GraphQL endpoint, classifies failures and
//! walks cursor-based pagination lazily. Consecutive requests of one
//! paginated query are spaced by a fixed interval; nothing is retried.

use async_trait::async_trait;
use futures::stream::{self, Stream};
use gitpulse_core::{protocol_error, ErrorContext, PulseError, PulseResult, ServerError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::{create_http_client, handle_response_error, ApiClientConfig};

/// Variable name the executor uses to thread the pagination cursor
pub const CURSOR_VARIABLE: &str = "cursor";

/// Request body sent to the GraphQL endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphQlRequest {
    pub query: String,
    pub variables: Map<String, Value>,
}

/// Transport seam between the executor and the network
#[async_trait]
pub trait GraphQlTransport: Send + Sync {
    /// Send one request and return the decoded JSON body.
    ///
    /// Implementations report non-success statuses and undecodable bodies as
    /// `PulseError::Protocol`.
    async fn send(&self, request: &GraphQlRequest) -> PulseResult<Value>;
}

/// reqwest-backed transport with bearer authentication
pub struct HttpGraphQlTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpGraphQlTransport {
    pub fn new(config: &ApiClientConfig) -> PulseResult<Self> {
        let client = create_http_client(config)?;
        debug!(endpoint = %config.graphql_url, "Created GraphQL transport");

        Ok(Self {
            client,
            endpoint: config.graphql_url.clone(),
        })
    }
}

#[async_trait]
impl GraphQlTransport for HttpGraphQlTransport {
    async fn send(&self, request: &GraphQlRequest) -> PulseResult<Value> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| PulseError::Protocol {
                message: format!("Failed to reach GraphQL endpoint: {}", e),
                status: e.status().map(|s| s.as_u16()),
                source: Some(Box::new(e)),
                context: ErrorContext::new("graphql_transport").with_operation("send"),
            })?;

        if !response.status().is_success() {
            return Err(handle_response_error(response, "graphql_request").await);
        }

        response.json::<Value>().await.map_err(|e| PulseError::Protocol {
            message: format!("GraphQL response is not valid JSON: {}", e),
            status: None,
            source: Some(Box::new(e)),
            context: ErrorContext::new("graphql_transport").with_operation("decode_body"),
        })
    }
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Option<Vec<ServerError>>,
}

/// Pagination state reported for one page of a connection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageInfo {
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPageInfo {
    has_next_page: Option<bool>,
    end_cursor: Option<String>,
}

/// One page of a paginated connection
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPage {
    /// Zero-based position of the page within its sequence
    pub index: usize,
    /// The connection object (`Value::Null` when the server returned none)
    pub connection: Value,
    pub page_info: PageInfo,
}

impl QueryPage {
    /// Deserialize the connection's `nodes` list. A missing list is empty;
    /// a list that does not match `T` is a protocol error.
    pub fn nodes<T: DeserializeOwned>(&self) -> PulseResult<Vec<T>> {
        match self.connection.get("nodes") {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(nodes) => serde_json::from_value(nodes.clone()).map_err(|e| {
                schema_error(format!("page {} nodes do not match schema: {}", self.index, e), e)
            }),
        }
    }
}

fn schema_error(message: String, source: serde_json::Error) -> PulseError {
    protocol_error!(message, "graphql_client", source)
}

/// Executes queries through a transport
#[derive(Clone)]
pub struct GraphQlClient {
    transport: Arc<dyn GraphQlTransport>,
    request_interval: Duration,
}

impl GraphQlClient {
    pub fn new(transport: Arc<dyn GraphQlTransport>, request_interval: Duration) -> Self {
        Self {
            transport,
            request_interval,
        }
    }

    /// Execute a single request and return its `data` object
    pub async fn query(&self, query: &str, variables: Map<String, Value>) -> PulseResult<Value> {
        let request = GraphQlRequest {
            query: query.to_string(),
            variables,
        };
        let body = self.transport.send(&request).await?;
        Self::classify(body)
    }

    /// Start a lazy page sequence over the connection found at
    /// `connection_pointer` (a JSON pointer into `data`).
    ///
    /// The sequence is unbounded by itself; callers cap it.
    pub fn paginate(
        &self,
        query: &str,
        base_variables: Map<String, Value>,
        connection_pointer: &str,
    ) -> Paginator {
        Paginator {
            client: self.clone(),
            query: query.to_string(),
            base_variables,
            connection_pointer: connection_pointer.to_string(),
            cursor: None,
            pages_fetched: 0,
            finished: false,
        }
    }

    fn classify(body: Value) -> PulseResult<Value> {
        let response: GraphQlResponse = serde_json::from_value(body)
            .map_err(|e| schema_error(format!("unexpected GraphQL response shape: {}", e), e))?;

        match response.errors {
            Some(errors) if !errors.is_empty() => {
                return Err(PulseError::Query {
                    errors,
                    context: ErrorContext::new("graphql_client").with_operation("query"),
                });
            }
            _ => {}
        }

        match response.data {
            Some(data) if !data.is_null() => Ok(data),
            _ => Err(protocol_error!(
                "GraphQL response carries neither data nor errors",
                "graphql_client"
            )),
        }
    }
}

/// Lazy, cursor-threaded sequence of pages for one query
pub struct Paginator {
    client: GraphQlClient,
    query: String,
    base_variables: Map<String, Value>,
    connection_pointer: String,
    cursor: Option<String>,
    pages_fetched: usize,
    finished: bool,
}

impl Paginator {
    /// Number of requests issued so far
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Fetch the next page. Returns `None` once the server reports no further
    /// page or after the first failure.
    pub async fn next_page(&mut self) -> Option<PulseResult<QueryPage>> {
        if self.finished {
            return None;
        }

        if self.pages_fetched > 0 && !self.client.request_interval.is_zero() {
            tokio::time::sleep(self.client.request_interval).await;
        }

        let mut variables = self.base_variables.clone();
        variables.insert(
            CURSOR_VARIABLE.to_string(),
            self.cursor.clone().map(Value::String).unwrap_or(Value::Null),
        );

        let index = self.pages_fetched;
        self.pages_fetched += 1;

        let result = match self.client.query(&self.query, variables).await {
            Ok(data) => self.extract_page(index, &data),
            Err(e) => Err(e),
        };

        match result {
            Ok(page) => {
                debug!(
                    page = index,
                    has_next_page = page.page_info.has_next_page,
                    "Fetched page"
                );
                match (page.page_info.has_next_page, page.page_info.end_cursor.as_ref()) {
                    (true, Some(cursor)) => self.cursor = Some(cursor.clone()),
                    (true, None) => {
                        warn!(page = index, "Server reported a next page without a cursor");
                        self.finished = true;
                    }
                    (false, _) => self.finished = true,
                }
                Some(Ok(page))
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }

    /// Adapt the paginator into a `Stream` of pages
    pub fn into_stream(self) -> impl Stream<Item = PulseResult<QueryPage>> + Send {
        stream::unfold(self, |mut paginator| async move {
            paginator
                .next_page()
                .await
                .map(|page| (page, paginator))
        })
    }

    fn extract_page(&self, index: usize, data: &Value) -> PulseResult<QueryPage> {
        let connection = match data.pointer(&self.connection_pointer) {
            None | Some(Value::Null) => {
                return Ok(QueryPage {
                    index,
                    connection: Value::Null,
                    page_info: PageInfo::default(),
                })
            }
            Some(connection) => connection.clone(),
        };

        let page_info = match connection.get("pageInfo") {
            None | Some(Value::Null) => PageInfo::default(),
            Some(raw) => {
                let raw: RawPageInfo = serde_json::from_value(raw.clone()).map_err(|e| {
                    schema_error(format!("page {} has malformed pageInfo: {}", index, e), e)
                })?;
                PageInfo {
                    has_next_page: raw.has_next_page.unwrap_or(false),
                    end_cursor: raw.end_cursor,
                }
            }
        };

        Ok(QueryPage {
            index,
            connection,
            page_info,
        })
    }
}
