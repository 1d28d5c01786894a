//! REST API exposure
//!
//! Consumes a `ServerHost` and produces an Axum `Router` with health checks,
//! the query routes and any custom routes, wrapped in tracing and CORS layers.

use super::super::host::ServerHost;
use crate::server::router::build_query_routes;
use anyhow::Result;
use axum::{Json, Router, routing::get};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub struct RestExposure;

impl RestExposure {
    /// Build the REST router from a host
    pub fn build_router(host: Arc<ServerHost>, custom_routes: Vec<Router>) -> Result<Router> {
        let mut app = Self::health_routes().merge(build_query_routes(host));

        for custom_router in custom_routes {
            app = app.merge(custom_router);
        }

        Ok(app.layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        ))
    }

    fn health_routes() -> Router {
        Router::new()
            .route("/health", get(Self::health_check))
            .route("/healthz", get(Self::health_check))
    }

    async fn health_check() -> Json<Value> {
        Json(json!({
            "status": "ok",
            "service": "workspace-query-runner"
        }))
    }
}
