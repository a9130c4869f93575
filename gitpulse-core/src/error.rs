//! Unified error handling system
//!
//! Structured error types with context, recovery hints and proper error chaining.
//! The variants mirror the failure classes of the analytics pipeline: identifier
//! parsing, transport, server-reported query errors, cloning and scanning.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, warn};

pub type PulseResult<T> = Result<T, PulseError>;

/// Error context providing additional information for debugging and recovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Timestamp when error occurred
    pub timestamp: DateTime<Utc>,
    /// Component where error originated
    pub component: String,
    /// Operation being performed when error occurred
    pub operation: Option<String>,
    /// Additional metadata
    pub metadata: std::collections::HashMap<String, String>,
    /// Recovery suggestions
    pub recovery_suggestions: Vec<String>,
}

impl ErrorContext {
    pub fn new(component: &str) -> Self {
        Self {
            error_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            component: component.to_string(),
            operation: None,
            metadata: std::collections::HashMap::new(),
            recovery_suggestions: Vec::new(),
        }
    }

    pub fn with_operation(mut self, operation: &str) -> Self {
        self.operation = Some(operation.to_string());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_suggestion(mut self, suggestion: &str) -> Self {
        self.recovery_suggestions.push(suggestion.to_string());
        self
    }
}

/// A single error entry reported by the GraphQL server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerError {
    pub message: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<serde_json::Value>,
}

/// Main error type for the gitpulse pipeline
#[derive(Error, Debug)]
pub enum PulseError {
    #[error("Parse error: {message}")]
    Parse { message: String, input: String },

    #[error("Protocol error: {message}")]
    Protocol {
        message: String,
        status: Option<u16>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Query error: {}", join_messages(.errors))]
    Query {
        errors: Vec<ServerError>,
        context: ErrorContext,
    },

    #[error("Clone error: {message}")]
    Clone {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Scan error: {message}")]
    Scan {
        message: String,
        path: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Operation timeout: {operation}")]
    Timeout {
        operation: String,
        duration_ms: u64,
        context: ErrorContext,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },
}

fn join_messages(errors: &[ServerError]) -> String {
    if errors.is_empty() {
        return "server reported an empty error list".to_string();
    }
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

impl PulseError {
    /// Get the error context
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            PulseError::Protocol { context, .. } => Some(context),
            PulseError::Query { context, .. } => Some(context),
            PulseError::Clone { context, .. } => Some(context),
            PulseError::Config { context, .. } => Some(context),
            PulseError::Timeout { context, .. } => Some(context),
            PulseError::Internal { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Whether a later attempt could succeed. The pipeline itself never retries.
    pub fn is_recoverable(&self) -> bool {
        match self {
            PulseError::Protocol { status, .. } => {
                !matches!(status, Some(400) | Some(401) | Some(404))
            }
            PulseError::Timeout { .. } => true,
            PulseError::Clone { .. } => true,
            PulseError::Parse { .. } => false,
            PulseError::Query { .. } => false,
            PulseError::Config { .. } => false,
            _ => false,
        }
    }

    /// Log the error with appropriate level
    pub fn log(&self) {
        match self {
            PulseError::Internal { .. } => {
                error!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Internal error occurred"
                );
            }
            PulseError::Config { .. } | PulseError::Parse { .. } => {
                error!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Configuration or input error"
                );
            }
            PulseError::Protocol { .. } | PulseError::Query { .. } | PulseError::Timeout { .. } => {
                warn!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Remote request failed"
                );
            }
            PulseError::Scan { .. } => {
                debug!(error = %self, "File skipped during scan");
            }
            _ => {
                error!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Error occurred"
                );
            }
        }
    }
}

/// Convenience macros for creating errors with context
#[macro_export]
macro_rules! protocol_error {
    ($msg:expr, $component:expr) => {
        $crate::PulseError::Protocol {
            message: $msg.to_string(),
            status: None,
            source: None,
            context: $crate::ErrorContext::new($component),
        }
    };
    ($msg:expr, $component:expr, $source:expr) => {
        $crate::PulseError::Protocol {
            message: $msg.to_string(),
            status: None,
            source: Some(Box::new($source)),
            context: $crate::ErrorContext::new($component),
        }
    };
}

#[macro_export]
macro_rules! clone_error {
    ($msg:expr, $component:expr) => {
        $crate::PulseError::Clone {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check that the repository exists and the token can read it"),
        }
    };
    ($msg:expr, $component:expr, $source:expr) => {
        $crate::PulseError::Clone {
            message: $msg.to_string(),
            source: Some(Box::new($source)),
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Ensure git is installed and accessible"),
        }
    };
}

#[macro_export]
macro_rules! config_error {
    ($msg:expr, $component:expr) => {
        $crate::PulseError::Config {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check your configuration file"),
        }
    };
    ($msg:expr, $component:expr, $suggestion:expr) => {
        $crate::PulseError::Config {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component)
                .with_operation("validate")
                .with_suggestion($suggestion),
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_error_joins_server_messages() {
        let err = PulseError::Query {
            errors: vec![
                ServerError {
                    message: "Could not resolve to a Repository".to_string(),
                    kind: Some("NOT_FOUND".to_string()),
                    path: vec![],
                },
                ServerError {
                    message: "Something else".to_string(),
                    kind: None,
                    path: vec![],
                },
            ],
            context: ErrorContext::new("test"),
        };

        assert_eq!(
            err.to_string(),
            "Query error: Could not resolve to a Repository; Something else"
        );
        assert!(!err.is_recoverable());
    }

    #[test]
    fn server_error_deserializes_github_shape() {
        let raw = serde_json::json!({
            "type": "NOT_FOUND",
            "path": ["repository"],
            "locations": [{"line": 2, "column": 3}],
            "message": "Could not resolve to a Repository with the name 'acme/ghost'."
        });

        let parsed: ServerError = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.kind.as_deref(), Some("NOT_FOUND"));
        assert_eq!(parsed.path.len(), 1);
    }

    #[test]
    fn protocol_recoverability_depends_on_status() {
        let unauthorized = PulseError::Protocol {
            message: "HTTP 401".to_string(),
            status: Some(401),
            source: None,
            context: ErrorContext::new("test"),
        };
        let bad_gateway = PulseError::Protocol {
            message: "HTTP 502".to_string(),
            status: Some(502),
            source: None,
            context: ErrorContext::new("test"),
        };

        assert!(!unauthorized.is_recoverable());
        assert!(bad_gateway.is_recoverable());
        assert!(unauthorized.context().is_some());
    }
}
