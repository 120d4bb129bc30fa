//! PostgreSQL-backed queue
//!
//! Jobs are stored with apalis in PostgreSQL. The API process only pushes;
//! `seqalign-server worker` runs the apalis monitor that executes them.

use anyhow::{Context, Result};
use apalis::prelude::*;
use apalis_postgres::PostgresStorage;
use async_trait::async_trait;
use sqlx::PgPool;
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::models::QueuedJob;
use super::queue::{log_worker_event, process_queued_job, JobQueue, QueueError};
use super::runner::WorkerContext;

const WORKER_NAME_PREFIX: &str = "seqalign-worker";

/// Producer side of the PostgreSQL queue
#[derive(Clone)]
pub struct PostgresQueue {
    storage: PostgresStorage<QueuedJob>,
}

impl PostgresQueue {
    /// Prepare the apalis schema and wrap the pool
    pub async fn connect(pool: &PgPool) -> Result<Self> {
        setup_storage(pool).await.map(|storage| Self { storage })
    }
}

#[async_trait]
impl JobQueue for PostgresQueue {
    async fn enqueue(&self, job: QueuedJob) -> Result<(), QueueError> {
        let mut storage = self.storage.clone();
        storage
            .push(job)
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;
        Ok(())
    }
}

async fn setup_storage(pool: &PgPool) -> Result<PostgresStorage<QueuedJob>> {
    info!("Setting up PostgreSQL storage for apalis");
    PostgresStorage::setup(pool)
        .await
        .context("Failed to run apalis migrations")?;
    Ok(PostgresStorage::new(pool))
}

/// Consumer side: a pool of apalis workers
pub struct JobScheduler {
    workers: usize,
    db: PgPool,
    context: WorkerContext,
}

impl JobScheduler {
    pub fn new(workers: usize, db: PgPool, context: WorkerContext) -> Self {
        Self {
            workers: workers.max(1),
            db,
            context,
        }
    }

    /// Register the workers and run the monitor in a background task
    pub async fn start(self) -> Result<JoinHandle<()>> {
        info!(workers = self.workers, "Starting job scheduler");

        let storage = setup_storage(&self.db).await?;

        let mut monitor = Monitor::new().on_event(log_worker_event);
        for index in 0..self.workers {
            let storage = storage.clone();
            let context = self.context.clone();
            monitor = monitor.register(move |_| {
                WorkerBuilder::new(format!("{WORKER_NAME_PREFIX}-{index}"))
                    .backend(storage.clone())
                    .data(context.clone())
                    .concurrency(1)
                    .build(process_queued_job)
            });
        }

        let handle = tokio::spawn(async move {
            info!("Job workers started");
            if let Err(e) = monitor.run().await {
                error!("Job worker error: {:?}", e);
            }
            info!("Job workers stopped");
        });

        Ok(handle)
    }
}
