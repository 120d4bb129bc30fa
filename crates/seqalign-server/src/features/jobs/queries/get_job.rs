use seqalign_common::types::{JobResult, JobState};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::AppError;
use crate::jobs::{JobRecord, JobTracker, StoreError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetJobQuery {
    pub job_id: String,
}

/// Status view of one job.
///
/// `result` is only present on SUCCESS and `status` (the captured error text)
/// only on FAILURE. `job_id` echoes the requested id verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub job_id: String,
    pub state: JobState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
}

impl From<JobRecord> for JobStatusResponse {
    fn from(record: JobRecord) -> Self {
        let (status, result) = match record.state {
            JobState::Success => (None, record.result),
            JobState::Failure => (record.error, None),
            JobState::Pending | JobState::Started => (None, None),
        };

        Self {
            job_id: record.job_id.to_string(),
            state: record.state,
            status,
            result,
        }
    }
}

impl JobStatusResponse {
    /// View of a job the store has never seen
    pub fn unknown(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            state: JobState::Pending,
            status: None,
            result: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GetJobError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<GetJobError> for AppError {
    fn from(err: GetJobError) -> Self {
        match err {
            GetJobError::Store(e) => e.into(),
        }
    }
}

impl GetJobQuery {
    /// `None` when the id cannot belong to any job this service issued
    pub fn parse_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.job_id).ok()
    }
}

/// Ids the store has never seen report as PENDING, including ones that are not UUIDs
#[tracing::instrument(skip(tracker))]
pub async fn handle(tracker: &JobTracker, query: GetJobQuery) -> Result<JobStatusResponse, GetJobError> {
    let Some(job_id) = query.parse_id() else {
        debug!("Job id is not a UUID, reporting PENDING");
        return Ok(JobStatusResponse::unknown(query.job_id));
    };

    let record = tracker.status(job_id).await?;
    Ok(record.into())
}
