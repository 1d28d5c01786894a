//! ServerBuilder for fluent API to build HTTP servers

use super::exposure::RestExposure;
use super::host::{ServerHost, WorkspaceMetadataStore};
use crate::config::RunnerConfig;
use crate::core::events::EventBus;
use crate::core::metadata::ObjectMetadataMap;
use crate::core::queue::{InMemoryQueue, JobQueue};
use crate::core::service::DataSourceProvider;
use crate::runner::{HookRegistry, QueryRunner};
use anyhow::Result;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use uuid::Uuid;

/// Builder for creating HTTP servers around a [`QueryRunner`]
///
/// # Example
///
/// ```ignore
/// let app = ServerBuilder::new()
///     .with_config(RunnerConfig::from_yaml_file("runner.yaml")?)
///     .with_data_source_provider(InMemoryStore::new())
///     .register_workspace(workspace_id, MetadataConfig::from_yaml_file("objects.yaml")?.into_map())
///     .build()?;
/// ```
pub struct ServerBuilder {
    config: RunnerConfig,
    data_sources: Option<Arc<dyn DataSourceProvider>>,
    workspaces: Vec<(Uuid, ObjectMetadataMap)>,
    hooks: HookRegistry,
    job_queue: Option<Arc<dyn JobQueue>>,
    event_bus: Option<EventBus>,
    custom_routes: Vec<Router>,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            config: RunnerConfig::default(),
            data_sources: None,
            workspaces: Vec::new(),
            hooks: HookRegistry::new(),
            job_queue: None,
            event_bus: None,
            custom_routes: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: RunnerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the storage provider (required)
    pub fn with_data_source_provider(mut self, provider: impl DataSourceProvider + 'static) -> Self {
        self.data_sources = Some(Arc::new(provider));
        self
    }

    /// Declare the objects of a workspace
    pub fn register_workspace(mut self, workspace_id: Uuid, metadata: ObjectMetadataMap) -> Self {
        self.workspaces.push((workspace_id, metadata));
        self
    }

    pub fn with_hooks(mut self, hooks: HookRegistry) -> Self {
        self.hooks = hooks;
        self
    }

    /// Queue receiving webhook jobs; defaults to an [`InMemoryQueue`] nobody works
    pub fn with_job_queue(mut self, queue: Arc<dyn JobQueue>) -> Self {
        self.job_queue = Some(queue);
        self
    }

    /// Bus receiving domain events; defaults to one sized by
    /// `event_bus_capacity`
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Add routes outside the query surface (auth, health probes, ...)
    pub fn with_custom_routes(mut self, routes: Router) -> Self {
        self.custom_routes.push(routes);
        self
    }

    /// Build the transport-agnostic host
    pub fn build_host(mut self) -> Result<ServerHost> {
        self.config.validate()?;

        let data_sources = self.data_sources.take().ok_or_else(|| {
            anyhow::anyhow!("DataSourceProvider is required. Call .with_data_source_provider()")
        })?;

        let metadata = Arc::new(WorkspaceMetadataStore::new());
        for (workspace_id, map) in self.workspaces {
            metadata.register(workspace_id, map)?;
        }

        let event_bus = self
            .event_bus
            .unwrap_or_else(|| EventBus::new(self.config.event_bus_capacity));
        let job_queue = self
            .job_queue
            .unwrap_or_else(|| Arc::new(InMemoryQueue::new()));

        let runner = QueryRunner::new(self.config, Arc::new(event_bus.clone()), job_queue)
            .with_hooks(self.hooks);

        Ok(ServerHost::new(Arc::new(runner), metadata, data_sources).with_event_bus(event_bus))
    }

    /// Build the REST router
    pub fn build(mut self) -> Result<Router> {
        let custom_routes = std::mem::take(&mut self.custom_routes);
        let host = Arc::new(self.build_host()?);
        RestExposure::build_router(host, custom_routes)
    }

    /// Serve the application with graceful shutdown on SIGTERM and Ctrl+C
    pub async fn serve(self, addr: &str) -> Result<()> {
        let app = self.build()?;
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}
