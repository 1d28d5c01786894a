//! Typed error handling for the query runner
//!
//! Every failure a caller can observe from the dispatch pipeline is one of the
//! [`QueryRunnerError`] variants. Validation failures are raised before any
//! storage access; storage failures are propagated unchanged; side-effect
//! failures (queue enqueue) are logged and never surface through this type
//! once a mutation has committed.
//!
//! # Example
//!
//! ```rust,ignore
//! match runner.update_one(args, &options).await {
//!     Ok(record) => println!("updated {}", record.id().unwrap()),
//!     Err(QueryRunnerError::RecordNotFound { object, .. }) => {
//!         println!("no {} with that id", object);
//!     }
//!     Err(e) => eprintln!("other error: {}", e),
//! }
//! ```

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// The main error type of the query runner
#[derive(Debug)]
pub enum QueryRunnerError {
    /// Malformed arguments (missing id, bad UUID, unknown field...)
    InvalidInput { message: String },

    /// Mutation attempted against a remote (read-only) object type
    MutationForbidden { object: String },

    /// Zero rows matched a single-record target
    RecordNotFound { object: String, id: Option<Uuid> },

    /// Unknown object type requested
    MetadataNotFound { object: String },

    /// Operation name does not map to any resolver
    UnknownOperation { operation: String },

    /// A pre- or post-query hook rejected the operation
    HookRejected { hook: String, message: String },

    /// Storage collaborator failure, propagated as-is
    Storage { message: String },

    /// Job queue failure
    Queue(QueueError),

    /// Internal runner errors (should not happen in normal operation)
    Internal(String),
}

impl fmt::Display for QueryRunnerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryRunnerError::InvalidInput { message } => {
                write!(f, "Invalid input: {}", message)
            }
            QueryRunnerError::MutationForbidden { object } => {
                write!(f, "Remote object '{}' is read-only", object)
            }
            QueryRunnerError::RecordNotFound { object, id } => match id {
                Some(id) => write!(f, "{} record '{}' not found", object, id),
                None => write!(f, "{} record not found", object),
            },
            QueryRunnerError::MetadataNotFound { object } => {
                write!(f, "Object metadata not found for '{}'", object)
            }
            QueryRunnerError::UnknownOperation { operation } => {
                write!(f, "Unknown operation: {}", operation)
            }
            QueryRunnerError::HookRejected { hook, message } => {
                write!(f, "Hook '{}' rejected the operation: {}", hook, message)
            }
            QueryRunnerError::Storage { message } => {
                write!(f, "Storage error: {}", message)
            }
            QueryRunnerError::Queue(e) => write!(f, "{}", e),
            QueryRunnerError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for QueryRunnerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            QueryRunnerError::Queue(e) => Some(e),
            _ => None,
        }
    }
}

/// Error response structure for HTTP responses
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl QueryRunnerError {
    /// Shorthand for [`QueryRunnerError::InvalidInput`]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        QueryRunnerError::InvalidInput {
            message: message.into(),
        }
    }

    /// Shorthand for [`QueryRunnerError::Storage`]
    pub fn storage(err: impl fmt::Display) -> Self {
        QueryRunnerError::Storage {
            message: err.to_string(),
        }
    }

    /// Convert an error returned by a hook.
    ///
    /// A hook that already speaks in runner errors (e.g. raising
    /// `MutationForbidden` itself) keeps its variant.
    pub fn from_hook(hook: &str, err: anyhow::Error) -> Self {
        match err.downcast::<QueryRunnerError>() {
            Ok(runner_err) => runner_err,
            Err(other) => QueryRunnerError::HookRejected {
                hook: hook.to_string(),
                message: other.to_string(),
            },
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            QueryRunnerError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            QueryRunnerError::MutationForbidden { .. } => StatusCode::FORBIDDEN,
            QueryRunnerError::RecordNotFound { .. } => StatusCode::NOT_FOUND,
            QueryRunnerError::MetadataNotFound { .. } => StatusCode::NOT_FOUND,
            QueryRunnerError::UnknownOperation { .. } => StatusCode::BAD_REQUEST,
            QueryRunnerError::HookRejected { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            QueryRunnerError::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            QueryRunnerError::Queue(_) => StatusCode::SERVICE_UNAVAILABLE,
            QueryRunnerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            QueryRunnerError::InvalidInput { .. } => "INVALID_QUERY_INPUT",
            QueryRunnerError::MutationForbidden { .. } => "MUTATION_FORBIDDEN",
            QueryRunnerError::RecordNotFound { .. } => "RECORD_NOT_FOUND",
            QueryRunnerError::MetadataNotFound { .. } => "METADATA_NOT_FOUND",
            QueryRunnerError::UnknownOperation { .. } => "UNKNOWN_OPERATION",
            QueryRunnerError::HookRejected { .. } => "HOOK_REJECTED",
            QueryRunnerError::Storage { .. } => "STORAGE_ERROR",
            QueryRunnerError::Queue(_) => "QUEUE_ERROR",
            QueryRunnerError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Convert to an error response
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.error_code().to_string(),
            message: self.to_string(),
            details: self.details(),
        }
    }

    /// Get additional details for the error
    fn details(&self) -> Option<serde_json::Value> {
        match self {
            QueryRunnerError::RecordNotFound { object, id } => Some(serde_json::json!({
                "object": object,
                "id": id.map(|id| id.to_string()),
            })),
            QueryRunnerError::MutationForbidden { object }
            | QueryRunnerError::MetadataNotFound { object } => {
                Some(serde_json::json!({ "object": object }))
            }
            QueryRunnerError::HookRejected { hook, .. } => {
                Some(serde_json::json!({ "hook": hook }))
            }
            _ => None,
        }
    }
}

impl IntoResponse for QueryRunnerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self.to_response());
        (status, body).into_response()
    }
}

// =============================================================================
// Queue and config errors
// =============================================================================

/// Errors raised by a job queue
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue '{queue}' is closed")]
    Closed { queue: String },

    #[error("failed to serialize job '{job}': {message}")]
    Serialization { job: String, message: String },

    #[error("no handler registered for job '{job}'")]
    UnknownJob { job: String },
}

impl From<QueueError> for QueryRunnerError {
    fn from(err: QueueError) -> Self {
        QueryRunnerError::Queue(err)
    }
}

/// Errors raised while loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

// =============================================================================
// Conversions from external errors
// =============================================================================

impl From<serde_json::Error> for QueryRunnerError {
    fn from(err: serde_json::Error) -> Self {
        QueryRunnerError::InvalidInput {
            message: err.to_string(),
        }
    }
}

impl From<uuid::Error> for QueryRunnerError {
    fn from(err: uuid::Error) -> Self {
        QueryRunnerError::InvalidInput {
            message: format!("Invalid UUID: {}", err),
        }
    }
}

/// Storage collaborators speak `anyhow`; a wrapped runner error keeps its
/// variant, anything else is a storage failure.
impl From<anyhow::Error> for QueryRunnerError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<QueryRunnerError>() {
            Ok(runner_err) => runner_err,
            Err(other) => QueryRunnerError::Storage {
                message: other.to_string(),
            },
        }
    }
}

/// A specialized Result type for query runner operations
pub type QueryRunnerResult<T> = Result<T, QueryRunnerError>;
