//! Request context for the query runner
//!
//! Authentication itself happens upstream. The runner only needs to know which
//! workspace a call targets and, when available, which user or API key made it.

use crate::core::error::{QueryRunnerError, QueryRunnerResult};
use axum::http::HeaderMap;
use uuid::Uuid;

pub const WORKSPACE_ID_HEADER: &str = "x-workspace-id";
pub const USER_ID_HEADER: &str = "x-user-id";
pub const API_KEY_ID_HEADER: &str = "x-api-key-id";

/// Tenant and caller identity of a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub workspace_id: Uuid,
    pub user_id: Option<Uuid>,
    pub api_key_id: Option<Uuid>,
}

impl AuthContext {
    pub fn new(workspace_id: Uuid) -> Self {
        Self {
            workspace_id,
            user_id: None,
            api_key_id: None,
        }
    }

    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_api_key(mut self, api_key_id: Uuid) -> Self {
        self.api_key_id = Some(api_key_id);
        self
    }

    /// Extract the context from request headers
    ///
    /// `x-workspace-id` is required; `x-user-id` and `x-api-key-id` are optional
    /// but must be valid UUIDs when present.
    pub fn from_headers(headers: &HeaderMap) -> QueryRunnerResult<Self> {
        let workspace_id = header_uuid(headers, WORKSPACE_ID_HEADER)?.ok_or_else(|| {
            QueryRunnerError::invalid_input(format!("Missing '{}' header", WORKSPACE_ID_HEADER))
        })?;

        Ok(Self {
            workspace_id,
            user_id: header_uuid(headers, USER_ID_HEADER)?,
            api_key_id: header_uuid(headers, API_KEY_ID_HEADER)?,
        })
    }
}

fn header_uuid(headers: &HeaderMap, name: &str) -> QueryRunnerResult<Option<Uuid>> {
    let Some(raw) = headers.get(name) else {
        return Ok(None);
    };
    let value = raw
        .to_str()
        .map_err(|_| QueryRunnerError::invalid_input(format!("Header '{}' is not valid text", name)))?;
    Uuid::parse_str(value.trim()).map(Some).map_err(|_| {
        QueryRunnerError::invalid_input(format!("Header '{}' must be a UUID, got '{}'", name, value))
    })
}
