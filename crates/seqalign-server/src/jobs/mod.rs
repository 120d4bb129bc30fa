//! Asynchronous job orchestration
//!
//! Submissions are recorded as PENDING, pushed onto a [`JobQueue`], picked up
//! by exactly one worker and executed by [`runner::run_job`], which drives the
//! [`JobTracker`] state machine through to SUCCESS or FAILURE.

pub mod models;
pub mod queue;
pub mod runner;
pub mod scheduler;
pub mod store;
pub mod tracker;

pub use models::{AlignmentJob, IndexJob, JobRecord, QueuedJob};
pub use queue::{process_queued_job, JobQueue, MemoryQueue, QueueError, WorkerJobError};
pub use runner::{run_job, JobOutcome, WorkerContext};
pub use scheduler::{JobScheduler, PostgresQueue};
pub use store::{FileJobStore, JobStore, MemoryJobStore, StoreError};
pub use tracker::JobTracker;
