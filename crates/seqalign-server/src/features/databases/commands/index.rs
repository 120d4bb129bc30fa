use seqalign_common::types::{JobKind, ToolKind};
use serde::{Deserialize, Serialize};

use crate::api::response::JobAccepted;
use crate::error::AppError;
use crate::features::FeatureState;
use crate::jobs::{IndexJob, QueueError, StoreError};
use crate::references::FileStoreError;

/// Build one tool's index for a reference database, through the queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexDatabaseCommand {
    #[serde(skip)]
    pub db_id: String,
    pub tool: String,
}

#[derive(Debug, thiserror::Error)]
pub enum IndexDatabaseError {
    #[error("Unsupported tool '{0}'")]
    UnsupportedTool(String),
    #[error(transparent)]
    Files(#[from] FileStoreError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Queue(#[from] QueueError),
}

impl From<IndexDatabaseError> for AppError {
    fn from(err: IndexDatabaseError) -> Self {
        match err {
            IndexDatabaseError::UnsupportedTool(_) => AppError::Validation(err.to_string()),
            IndexDatabaseError::Files(e) => e.into(),
            IndexDatabaseError::Store(e) => e.into(),
            IndexDatabaseError::Queue(e) => e.into(),
        }
    }
}

impl IndexDatabaseCommand {
    pub fn validate(&self) -> Result<ToolKind, IndexDatabaseError> {
        self.tool
            .parse()
            .map_err(|_| IndexDatabaseError::UnsupportedTool(self.tool.clone()))
    }
}

#[tracing::instrument(skip(state))]
pub async fn handle(
    state: &FeatureState,
    command: IndexDatabaseCommand,
) -> Result<JobAccepted, IndexDatabaseError> {
    let tool = command.validate()?;
    let reference = state.references.resolve_database(&command.db_id).await?;

    let job = IndexJob::new(reference, tool);
    let job_id = job.job_id;

    state.tracker.create(job_id, JobKind::Index).await?;
    state.queue.enqueue(job.into()).await?;

    tracing::info!(%job_id, database = %command.db_id, %tool, "Index job queued");
    Ok(JobAccepted::pending(job_id))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_both_tool_names() {
        let command = IndexDatabaseCommand {
            db_id: "hg38.fa".to_string(),
            tool: "minimap2".to_string(),
        };
        assert_eq!(command.validate().unwrap(), ToolKind::LongRead);

        let command = IndexDatabaseCommand {
            db_id: "hg38.fa".to_string(),
            tool: "shortExact".to_string(),
        };
        assert_eq!(command.validate().unwrap(), ToolKind::ShortExact);
    }

    #[test]
    fn test_validate_rejects_unknown_tool() {
        let command = IndexDatabaseCommand {
            db_id: "hg38.fa".to_string(),
            tool: "bwa".to_string(),
        };
        assert!(matches!(
            command.validate(),
            Err(IndexDatabaseError::UnsupportedTool(_))
        ));
    }
}
