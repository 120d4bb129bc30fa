//! Job execution
//!
//! [`execute`] is the body of a job and knows nothing about job state.
//! [`run_job`] wraps it with the state machine: STARTED on pickup, then the
//! result or the captured error text. Both queue backends call `run_job`.

use seqalign_common::types::{IndexReport, JobResult, RunStatus};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::models::{AlignmentJob, IndexJob, QueuedJob};
use super::store::StoreError;
use super::tracker::JobTracker;
use crate::align::{fan_out, FanOutError};
use crate::tools::Toolbox;

/// Everything a worker needs to run jobs
#[derive(Debug, Clone)]
pub struct WorkerContext {
    pub toolbox: Arc<Toolbox>,
    pub tracker: JobTracker,
}

impl WorkerContext {
    pub fn new(toolbox: Arc<Toolbox>, tracker: JobTracker) -> Self {
        Self { toolbox, tracker }
    }
}

/// How a job body ended
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Success(JobResult),
    /// Rendered message of the fault that aborted the job
    Failure(String),
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Success(_))
    }
}

/// Attempts at writing a job's terminal state before giving up
const OUTCOME_WRITE_ATTEMPTS: u32 = 3;
const OUTCOME_WRITE_BACKOFF: Duration = Duration::from_millis(100);

/// Run `job` and record its outcome.
///
/// The outcome is written to the store before it is returned, so callers that
/// report failures to their queue do so only after the error text is durable.
/// A result that cannot be stored turns the job into a FAILURE carrying the
/// store error, so the record never stays STARTED.
#[tracing::instrument(skip(ctx, job), fields(job_id = %job.job_id(), kind = ?job.kind(), tool = %job.tool()))]
pub async fn run_job(ctx: &WorkerContext, job: QueuedJob) -> Result<JobOutcome, StoreError> {
    let job_id = job.job_id();
    ctx.tracker.mark_started(job_id).await?;
    info!("Job started");

    let outcome = execute(&ctx.toolbox, &job).await;

    match record_outcome(&ctx.tracker, job_id, &outcome).await {
        Ok(()) => {},
        Err(e @ StoreError::InvalidTransition { .. }) => return Err(e),
        Err(e) if outcome.is_success() => {
            error!(error = %e, "Could not store job result");
            let message = format!("Job finished but its result could not be stored: {e}");
            ctx.tracker.fail(job_id, message.clone()).await?;
            error!(error = %message, "Job failed");
            return Ok(JobOutcome::Failure(message));
        },
        Err(e) => return Err(e),
    }

    match outcome {
        JobOutcome::Success(_) => info!("Job succeeded"),
        JobOutcome::Failure(ref message) => error!(error = %message, "Job failed"),
    }

    Ok(outcome)
}

/// Write the terminal state, retrying transient store errors
async fn record_outcome(
    tracker: &JobTracker,
    job_id: Uuid,
    outcome: &JobOutcome,
) -> Result<(), StoreError> {
    let mut attempt = 1;
    loop {
        let written = match outcome {
            JobOutcome::Success(result) => tracker.complete(job_id, result.clone()).await,
            JobOutcome::Failure(message) => tracker.fail(job_id, message.clone()).await,
        };

        match written {
            Ok(_) => return Ok(()),
            Err(e @ StoreError::InvalidTransition { .. }) => return Err(e),
            Err(e) if attempt >= OUTCOME_WRITE_ATTEMPTS => return Err(e),
            Err(e) => {
                warn!(attempt, error = %e, "Retrying job outcome write");
                tokio::time::sleep(OUTCOME_WRITE_BACKOFF * attempt).await;
                attempt += 1;
            },
        }
    }
}

/// Job body without any state bookkeeping
pub async fn execute(toolbox: &Toolbox, job: &QueuedJob) -> JobOutcome {
    match job {
        QueuedJob::Alignment(job) => match run_alignment(toolbox, job).await {
            Ok(result) => JobOutcome::Success(result),
            Err(e) => JobOutcome::Failure(e.to_string()),
        },
        QueuedJob::Index(job) => JobOutcome::Success(run_index(toolbox, job).await),
    }
}

async fn run_alignment(toolbox: &Toolbox, job: &AlignmentJob) -> Result<JobResult, FanOutError> {
    let adapter = toolbox.adapter(job.tool);
    let report = fan_out(
        adapter,
        job.job_id,
        &job.query_path,
        &job.database_paths,
        &job.options,
    )
    .await?;
    Ok(JobResult::Alignment(report))
}

/// Index builds never fail the job; a failed build is reported in the payload
async fn run_index(toolbox: &Toolbox, job: &IndexJob) -> JobResult {
    let adapter = toolbox.adapter(job.tool);
    let output = adapter.index_output(&job.reference_path);
    let built = adapter.index(&job.reference_path, &output).await;

    JobResult::Index(IndexReport {
        status: if built {
            RunStatus::Completed
        } else {
            RunStatus::Failed
        },
        tool: job.tool,
        path: output,
    })
}
