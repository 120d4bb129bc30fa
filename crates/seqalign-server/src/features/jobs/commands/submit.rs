use seqalign_common::types::{JobKind, ToolKind};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::api::response::JobAccepted;
use crate::error::AppError;
use crate::features::FeatureState;
use crate::jobs::{AlignmentJob, QueueError, StoreError};
use crate::references::FileStoreError;
use crate::tools::ToolOptions;

/// Submit an alignment of one query against one or more databases
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitAlignmentCommand {
    /// Name of a file previously stored through the upload endpoint
    #[serde(default)]
    pub query_filename: Option<String>,
    /// Inline FASTA text
    #[serde(default)]
    pub query_sequence: Option<String>,
    #[serde(default)]
    pub db_ids: Vec<String>,
    pub tool: String,
    #[serde(default)]
    pub options: Option<ToolOptions>,
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitAlignmentError {
    #[error("Either query_filename or query_sequence must be provided")]
    QueryRequired,
    #[error("Provide only one of query_filename and query_sequence")]
    QueryAmbiguous,
    #[error("At least one database must be selected")]
    DatabasesRequired,
    #[error("Unsupported tool '{0}'")]
    UnsupportedTool(String),
    #[error(transparent)]
    Files(#[from] FileStoreError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Queue(#[from] QueueError),
}

impl From<SubmitAlignmentError> for AppError {
    fn from(err: SubmitAlignmentError) -> Self {
        match err {
            SubmitAlignmentError::Files(e) => e.into(),
            SubmitAlignmentError::Store(e) => e.into(),
            SubmitAlignmentError::Queue(e) => e.into(),
            other => AppError::Validation(other.to_string()),
        }
    }
}

/// Which query source a validated command uses
#[derive(Debug, PartialEq, Eq)]
enum QuerySource<'a> {
    Stored(&'a str),
    Inline(&'a str),
}

impl SubmitAlignmentCommand {
    pub fn validate(&self) -> Result<ToolKind, SubmitAlignmentError> {
        self.query_source()?;

        if self.db_ids.is_empty() {
            return Err(SubmitAlignmentError::DatabasesRequired);
        }

        self.tool
            .parse::<ToolKind>()
            .map_err(|_| SubmitAlignmentError::UnsupportedTool(self.tool.clone()))
    }

    fn query_source(&self) -> Result<QuerySource<'_>, SubmitAlignmentError> {
        let sequence = self.query_sequence.as_deref().filter(|s| !s.trim().is_empty());
        let filename = self.query_filename.as_deref().filter(|s| !s.is_empty());

        match (sequence, filename) {
            (Some(_), Some(_)) => Err(SubmitAlignmentError::QueryAmbiguous),
            (Some(sequence), None) => Ok(QuerySource::Inline(sequence)),
            (None, Some(filename)) => Ok(QuerySource::Stored(filename)),
            (None, None) => Err(SubmitAlignmentError::QueryRequired),
        }
    }
}

/// Validate, resolve every file, record the job as PENDING and enqueue it.
///
/// Databases are resolved before an inline query is written so a rejected
/// submission leaves no file behind.
#[tracing::instrument(skip(state, command), fields(tool = %command.tool, databases = command.db_ids.len()))]
pub async fn handle(
    state: &FeatureState,
    command: SubmitAlignmentCommand,
) -> Result<JobAccepted, SubmitAlignmentError> {
    let tool = command.validate()?;

    let mut database_paths: Vec<PathBuf> = Vec::with_capacity(command.db_ids.len());
    for db_id in &command.db_ids {
        database_paths.push(state.references.resolve_database(db_id).await?);
    }

    let query_path = match command.query_source()? {
        QuerySource::Stored(filename) => state.references.resolve_upload(filename).await?,
        QuerySource::Inline(sequence) => state.references.write_inline_query(sequence).await?,
    };

    let job = AlignmentJob::new(
        query_path,
        database_paths,
        tool,
        command.options.unwrap_or_default(),
    );
    let job_id = job.job_id;

    state.tracker.create(job_id, JobKind::Alignment).await?;
    state.queue.enqueue(job.into()).await?;

    tracing::info!(%job_id, "Alignment job queued");
    Ok(JobAccepted::pending(job_id))
}
