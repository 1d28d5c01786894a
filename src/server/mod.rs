//! HTTP server exposing the query runner
//!
//! `ServerBuilder` assembles a `ServerHost` (runner, workspace metadata,
//! data sources) and exposes it through the REST routes:
//! - `POST /objects/{object}/{operation}`
//! - `GET /health`, `GET /healthz`

pub mod builder;
pub mod exposure;
pub mod host;
pub mod router;

pub use builder::ServerBuilder;
pub use exposure::RestExposure;
pub use host::{ServerHost, WorkspaceMetadataStore};
pub use router::{QueryRequest, build_query_routes};
