//! HTTP surface and process wiring
//!
//! [`build_state`] assembles the stores, the toolbox and the queue from a
//! [`Config`]; [`create_router`] mounts the feature routes with the standard
//! middleware stack. [`serve`] and [`run_worker`] are the two process modes.

pub mod response;

use anyhow::{Context, Result};
use axum::{http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tower_http::compression::CompressionLayer;
use tracing::{info, warn};

use crate::config::{Config, CorsConfig, QueueBackend};
use crate::features::{self, FeatureState};
use crate::jobs::{
    FileJobStore, JobQueue, JobScheduler, JobTracker, MemoryQueue, PostgresQueue, WorkerContext,
};
use crate::middleware;
use crate::references::{MetadataStore, ReferenceStore};
use crate::tools::Toolbox;

/// Build the application router with all routes and middleware
pub fn create_router(state: FeatureState, cors: &CorsConfig, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .merge(features::router(state, max_upload_bytes))
        // Apply layers from innermost to outermost
        .layer(CompressionLayer::new())
        .layer(middleware::tracing_layer())
        .layer(middleware::cors_layer(cors))
}

async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "SeqAlign API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Open a PostgreSQL pool for the apalis queue
pub async fn connect_pool(config: &Config) -> Result<PgPool> {
    let url = config
        .queue
        .database_url
        .as_deref()
        .context("DATABASE_URL is required for the postgres queue backend")?;

    info!("Connecting to queue database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.queue.max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(url)
        .await
        .context("Failed to connect to queue database")?;
    info!("Queue database connection pool established");

    Ok(pool)
}

/// Stores and toolbox shared by the API and the workers
async fn open_stores(config: &Config) -> Result<(ReferenceStore, MetadataStore, JobTracker, Arc<Toolbox>)> {
    let references = ReferenceStore::new(&config.storage.reference_dir, &config.storage.upload_dir);
    references
        .ensure_dirs()
        .await
        .context("Failed to create storage directories")?;

    let jobs = FileJobStore::open(&config.storage.jobs_dir)
        .await
        .context("Failed to open job store")?;
    let tracker = JobTracker::new(Arc::new(jobs));
    let metadata = MetadataStore::new(&config.storage.metadata_path);
    let toolbox = Arc::new(Toolbox::new(&config.tools));

    Ok((references, metadata, tracker, toolbox))
}

/// Assemble the API state.
///
/// With the local backend the apalis workers run in this process and the
/// monitor's handle is returned; it finishes once the state (and with it the
/// queue) is dropped and the backlog is drained.
pub async fn build_state(config: &Config) -> Result<(FeatureState, Option<JoinHandle<()>>)> {
    let (references, metadata, tracker, toolbox) = open_stores(config).await?;

    let (queue, workers): (Arc<dyn JobQueue>, Option<JoinHandle<()>>) = match config.queue.backend {
        QueueBackend::Local => {
            let context = WorkerContext::new(Arc::clone(&toolbox), tracker.clone());
            let (queue, handle) = MemoryQueue::start(context, config.queue.workers);
            (Arc::new(queue), Some(handle))
        },
        QueueBackend::Postgres => {
            let pool = connect_pool(config).await?;
            let queue = PostgresQueue::connect(&pool).await?;
            info!("Jobs will be pushed to the PostgreSQL queue");
            (Arc::new(queue), None)
        },
    };

    let state = FeatureState {
        references,
        metadata,
        tracker,
        queue,
        toolbox,
    };

    Ok((state, workers))
}

/// Run the HTTP server until a shutdown signal arrives
pub async fn serve(config: Config) -> Result<()> {
    let (state, workers) = build_state(&config).await?;
    let app = create_router(state, &config.cors, config.server.max_upload_bytes);

    let addr: SocketAddr = config.server_address().parse()?;
    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(config.server.shutdown_timeout_secs))
        .await?;

    // The router owned the last queue handle; local workers drain and exit
    if let Some(workers) = workers {
        let timeout = Duration::from_secs(config.server.shutdown_timeout_secs);
        if tokio::time::timeout(timeout, workers).await.is_err() {
            warn!("Local workers still busy after {}s, exiting anyway", timeout.as_secs());
        }
    }

    info!("Server shut down gracefully");
    Ok(())
}

/// Run apalis workers against the PostgreSQL queue
pub async fn run_worker(config: Config) -> Result<()> {
    if config.queue.backend != QueueBackend::Postgres {
        anyhow::bail!("The worker process needs QUEUE_BACKEND=postgres");
    }

    let (_, _, tracker, toolbox) = open_stores(&config).await?;
    let pool = connect_pool(&config).await?;
    let context = WorkerContext::new(toolbox, tracker);

    let mut handle = JobScheduler::new(config.queue.workers, pool, context)
        .start()
        .await?;

    tokio::select! {
        result = &mut handle => {
            result.context("Job scheduler task panicked")?;
        },
        _ = shutdown_signal(config.server.shutdown_timeout_secs) => {
            handle.abort();
        },
    }

    info!("Worker shut down");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM, then grants in-flight requests a short grace period
pub async fn shutdown_signal(timeout_secs: u64) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }

    info!("Waiting up to {} seconds for connections to close", timeout_secs);
    tokio::time::sleep(Duration::from_secs(timeout_secs.min(5))).await;
}
