//! Job payloads and persisted job records

use chrono::{DateTime, Utc};
use seqalign_common::types::{JobKind, JobResult, JobState, ToolKind};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::tools::ToolOptions;

/// Search a query against one or more reference databases
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignmentJob {
    pub job_id: Uuid,
    pub query_path: PathBuf,
    /// Resolved database paths, in submission order
    pub database_paths: Vec<PathBuf>,
    pub tool: ToolKind,
    #[serde(default)]
    pub options: ToolOptions,
    pub submitted_at: DateTime<Utc>,
}

impl AlignmentJob {
    pub fn new(
        query_path: PathBuf,
        database_paths: Vec<PathBuf>,
        tool: ToolKind,
        options: ToolOptions,
    ) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            query_path,
            database_paths,
            tool,
            options,
            submitted_at: Utc::now(),
        }
    }
}

/// Build one tool's index for a reference file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexJob {
    pub job_id: Uuid,
    pub reference_path: PathBuf,
    pub tool: ToolKind,
    pub submitted_at: DateTime<Utc>,
}

impl IndexJob {
    pub fn new(reference_path: PathBuf, tool: ToolKind) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            reference_path,
            tool,
            submitted_at: Utc::now(),
        }
    }
}

/// Message carried by the queue
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueuedJob {
    Alignment(AlignmentJob),
    Index(IndexJob),
}

impl QueuedJob {
    pub fn job_id(&self) -> Uuid {
        match self {
            QueuedJob::Alignment(job) => job.job_id,
            QueuedJob::Index(job) => job.job_id,
        }
    }

    pub fn kind(&self) -> JobKind {
        match self {
            QueuedJob::Alignment(_) => JobKind::Alignment,
            QueuedJob::Index(_) => JobKind::Index,
        }
    }

    pub fn tool(&self) -> ToolKind {
        match self {
            QueuedJob::Alignment(job) => job.tool,
            QueuedJob::Index(job) => job.tool,
        }
    }
}

impl From<AlignmentJob> for QueuedJob {
    fn from(job: AlignmentJob) -> Self {
        QueuedJob::Alignment(job)
    }
}

impl From<IndexJob> for QueuedJob {
    fn from(job: IndexJob) -> Self {
        QueuedJob::Index(job)
    }
}

/// Persisted state of one job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: Uuid,
    /// `None` only for the placeholder returned for ids nobody has written
    pub kind: Option<JobKind>,
    pub state: JobState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    pub fn pending(job_id: Uuid, kind: JobKind) -> Self {
        Self {
            job_id,
            kind: Some(kind),
            state: JobState::Pending,
            result: None,
            error: None,
            created_at: Some(Utc::now()),
            started_at: None,
            finished_at: None,
        }
    }

    /// What a status query sees for an id the store has never heard of
    pub fn unresolved(job_id: Uuid) -> Self {
        Self {
            job_id,
            kind: None,
            state: JobState::Pending,
            result: None,
            error: None,
            created_at: None,
            started_at: None,
            finished_at: None,
        }
    }
}
