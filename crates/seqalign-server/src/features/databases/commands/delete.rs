use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::features::FeatureState;
use crate::references::{FileStoreError, MetadataError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteDatabaseCommand {
    pub db_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteDatabaseResponse {
    pub id: String,
    pub deleted: bool,
    /// Reference file plus index artifacts
    pub removed_files: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum DeleteDatabaseError {
    #[error(transparent)]
    Files(#[from] FileStoreError),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

impl From<DeleteDatabaseError> for AppError {
    fn from(err: DeleteDatabaseError) -> Self {
        match err {
            DeleteDatabaseError::Files(e) => e.into(),
            DeleteDatabaseError::Metadata(e) => e.into(),
        }
    }
}

/// Remove the reference file, its index artifacts and its metadata entry.
///
/// Jobs already queued against the database are not touched; they fail when
/// the tool cannot open it.
#[tracing::instrument(skip(state))]
pub async fn handle(
    state: &FeatureState,
    command: DeleteDatabaseCommand,
) -> Result<DeleteDatabaseResponse, DeleteDatabaseError> {
    let removed = state.references.delete_reference(&command.db_id).await?;
    state.metadata.delete(&command.db_id).await?;

    Ok(DeleteDatabaseResponse {
        id: command.db_id,
        deleted: true,
        removed_files: removed.len(),
    })
}
