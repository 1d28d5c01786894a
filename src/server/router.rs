//! Query routes
//!
//! - `POST /objects/{object}/{operation}` runs one operation. The body is
//!   `{ "args": {...}, "selection": {...} }`; both keys are optional.
//! - Headers `x-workspace-id` (required) and `x-user-id` carry the caller.

use super::host::ServerHost;
use crate::core::auth::AuthContext;
use crate::core::error::{QueryRunnerError, QueryRunnerResult};
use crate::core::selection::SelectionTree;
use crate::runner::OperationResult;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub args: Value,

    /// Field tree (`{"name": {}, "company": {"name": {}}}`), or a GraphQL
    /// selection string with the `graphql` feature
    #[serde(default)]
    pub selection: Value,
}

fn parse_selection(selection: &Value) -> QueryRunnerResult<SelectionTree> {
    match selection {
        #[cfg(feature = "graphql")]
        Value::String(query) => SelectionTree::from_graphql(query),
        #[cfg(not(feature = "graphql"))]
        Value::String(_) => Err(QueryRunnerError::invalid_input(
            "GraphQL selections require the 'graphql' feature",
        )),
        other => SelectionTree::from_json(other),
    }
}

pub async fn run_operation(
    State(host): State<Arc<ServerHost>>,
    Path((object, operation)): Path<(String, String)>,
    headers: HeaderMap,
    Json(request): Json<QueryRequest>,
) -> Result<Json<OperationResult>, QueryRunnerError> {
    let auth_context = AuthContext::from_headers(&headers)?;
    let selection = parse_selection(&request.selection)?;
    let options = host.options(auth_context, &object, selection)?;

    let result = host
        .runner
        .execute_json(&operation, request.args, &options)
        .await?;
    Ok(Json(result))
}

/// Build the query routes of a host
pub fn build_query_routes(host: Arc<ServerHost>) -> Router {
    Router::new()
        .route("/objects/{object}/{operation}", post(run_operation))
        .with_state(host)
}
