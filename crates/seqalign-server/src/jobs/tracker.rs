//! Job state machine
//!
//! `PENDING -> STARTED -> SUCCESS | FAILURE`. Every write goes through
//! [`JobTracker::transition`], which refuses anything the state machine does
//! not allow, so a terminal record is never overwritten.

use chrono::Utc;
use seqalign_common::types::{JobKind, JobResult, JobState};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use super::models::JobRecord;
use super::store::{JobStore, StoreError};

#[derive(Clone)]
pub struct JobTracker {
    store: Arc<dyn JobStore>,
    /// Serializes read-modify-write cycles within this process
    write_lock: Arc<Mutex<()>>,
}

impl JobTracker {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self {
            store,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Record a freshly submitted job as PENDING
    pub async fn create(&self, job_id: Uuid, kind: JobKind) -> Result<JobRecord, StoreError> {
        let _guard = self.write_lock.lock().await;
        let record = JobRecord::pending(job_id, kind);
        self.store.save(&record).await?;
        debug!(%job_id, ?kind, "Job recorded as PENDING");
        Ok(record)
    }

    /// Current record; ids never written report as PENDING
    pub async fn status(&self, job_id: Uuid) -> Result<JobRecord, StoreError> {
        Ok(self
            .store
            .load(job_id)
            .await?
            .unwrap_or_else(|| JobRecord::unresolved(job_id)))
    }

    pub async fn mark_started(&self, job_id: Uuid) -> Result<JobRecord, StoreError> {
        self.transition(job_id, JobState::Started, |record| {
            record.started_at = Some(Utc::now());
        })
        .await
    }

    pub async fn complete(&self, job_id: Uuid, result: JobResult) -> Result<JobRecord, StoreError> {
        self.transition(job_id, JobState::Success, move |record| {
            record.result = Some(result);
            record.error = None;
            record.finished_at = Some(Utc::now());
        })
        .await
    }

    pub async fn fail(&self, job_id: Uuid, error: String) -> Result<JobRecord, StoreError> {
        self.transition(job_id, JobState::Failure, move |record| {
            record.result = None;
            record.error = Some(error);
            record.finished_at = Some(Utc::now());
        })
        .await
    }

    async fn transition<F>(
        &self,
        job_id: Uuid,
        next: JobState,
        apply: F,
    ) -> Result<JobRecord, StoreError>
    where
        F: FnOnce(&mut JobRecord) + Send,
    {
        let _guard = self.write_lock.lock().await;

        let mut record = self
            .store
            .load(job_id)
            .await?
            .unwrap_or_else(|| JobRecord::unresolved(job_id));

        if !record.state.can_transition_to(next) {
            warn!(%job_id, from = %record.state, to = %next, "Rejected job state transition");
            return Err(StoreError::InvalidTransition {
                job_id,
                from: record.state,
                to: next,
            });
        }

        record.state = next;
        apply(&mut record);
        self.store.save(&record).await?;

        debug!(%job_id, state = %next, "Job state updated");
        Ok(record)
    }
}

impl std::fmt::Debug for JobTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobTracker").finish_non_exhaustive()
    }
}
