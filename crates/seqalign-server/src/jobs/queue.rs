//! Task queue
//!
//! Submission goes through [`JobQueue`]. Both backends run jobs through apalis
//! workers calling [`process_queued_job`]:
//!
//! - [`MemoryQueue`]: apalis in-memory storage drained by a monitor inside the
//!   API process. Jobs are lost if the process exits.
//! - [`PostgresQueue`](super::scheduler::PostgresQueue): apalis storage in
//!   PostgreSQL, drained by `seqalign-server worker` processes.
//!
//! Either way a job is handed to exactly one worker and is never retried.

use apalis::prelude::*;
use async_trait::async_trait;
use futures::channel::mpsc;
use futures::{Sink, SinkExt, StreamExt};
use std::convert::Infallible;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::models::QueuedJob;
use super::runner::{run_job, JobOutcome, WorkerContext};
use super::store::StoreError;

const LOCAL_WORKER_PREFIX: &str = "seqalign-local";

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Job queue is closed")]
    Closed,

    #[error("Queue backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Hand `job` to the broker; returns once the broker has accepted it
    async fn enqueue(&self, job: QueuedJob) -> Result<(), QueueError>;
}

/// Error handed back to apalis so the task is marked failed
#[derive(Debug, Error)]
pub enum WorkerJobError {
    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// apalis handler; the job record is already FAILURE by the time an error is returned
pub async fn process_queued_job(
    job: QueuedJob,
    context: Data<WorkerContext>,
) -> Result<(), WorkerJobError> {
    match run_job(&context, job).await? {
        JobOutcome::Success(_) => Ok(()),
        JobOutcome::Failure(message) => Err(WorkerJobError::Failed(message)),
    }
}

type SharedReceiver = Arc<futures::lock::Mutex<mpsc::UnboundedReceiver<Task<QueuedJob>>>>;

/// In-process apalis queue with a fixed number of workers
#[derive(Debug, Clone)]
pub struct MemoryQueue {
    sink: Arc<Mutex<MemorySink<QueuedJob>>>,
}

impl MemoryQueue {
    /// Register `workers` apalis workers on one in-memory queue and run their
    /// monitor in a background task.
    ///
    /// Each worker runs one job at a time. The monitor stops once every
    /// `MemoryQueue` handle has been dropped and the backlog is drained.
    pub fn start(context: WorkerContext, workers: usize) -> (Self, JoinHandle<()>) {
        let workers = workers.max(1);
        let (sender, receiver) = mpsc::unbounded::<Task<QueuedJob>>();
        let receiver: SharedReceiver = Arc::new(futures::lock::Mutex::new(receiver));

        let mut monitor = Monitor::new().on_event(log_worker_event);
        for index in 0..workers {
            let receiver = Arc::clone(&receiver);
            let context = context.clone();
            monitor = monitor.register(move |_| {
                WorkerBuilder::new(format!("{LOCAL_WORKER_PREFIX}-{index}"))
                    .backend(worker_storage(Arc::clone(&receiver)))
                    .data(context.clone())
                    .concurrency(1)
                    .build(process_queued_job)
            });
        }

        let handle = tokio::spawn(async move {
            if let Err(e) = monitor.run().await {
                error!("Local job worker error: {:?}", e);
            }
            info!("Local job workers stopped");
        });

        info!(workers, "Local job workers started");
        let sink = memory_sink(sender.sink_map_err(MemoryStorageError::from));
        (
            Self {
                sink: Arc::new(Mutex::new(sink)),
            },
            handle,
        )
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    async fn enqueue(&self, job: QueuedJob) -> Result<(), QueueError> {
        // MemorySink clones share one inner sink, so pushes are serialized here
        let mut sink = self.sink.lock().await;
        sink.send(Task::new(job)).await.map_err(|e| match e {
            MemoryStorageError::SendError(_) => QueueError::Closed,
            other => QueueError::Backend(other.to_string()),
        })
    }
}

/// Storage for one worker: tasks come from the shared channel, and its own
/// push side is detached so only `MemoryQueue` handles keep the channel open
fn worker_storage(receiver: SharedReceiver) -> MemoryStorage<QueuedJob> {
    let tasks = futures::stream::unfold(receiver, |receiver| async move {
        // Only the idle worker holding the lock waits on the channel
        let task = receiver.lock().await.next().await;
        task.map(|task| (task, receiver))
    });

    let detached =
        futures::sink::drain::<Task<QueuedJob>>().sink_map_err(|never: Infallible| match never {});
    MemoryStorage::new_with(memory_sink(detached), tasks.boxed())
}

type BoxedTaskSink = Box<dyn Sink<Task<QueuedJob>, Error = MemoryStorageError> + Send + Sync + Unpin>;

fn memory_sink<S>(sink: S) -> MemorySink<QueuedJob>
where
    S: Sink<Task<QueuedJob>, Error = MemoryStorageError> + Send + Sync + Unpin + 'static,
{
    let sink: BoxedTaskSink = Box::new(sink);
    MemorySink::new(Arc::new(futures::lock::Mutex::new(sink)))
}

pub(super) fn log_worker_event(worker: &apalis::prelude::WorkerContext, event: &Event) {
    if let Event::Error(e) = event {
        warn!(worker = %worker.name(), error = %e, "Job ended in FAILURE");
    }
}
