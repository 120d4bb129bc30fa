use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::features::FeatureState;
use crate::references::{DatabaseMetadata, FileStoreError, MetadataError};

/// Merge descriptive fields into a database's metadata; omitted fields keep
/// their stored value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateDatabaseCommand {
    #[serde(skip)]
    pub db_id: String,
    pub species: Option<String>,
    pub genome_version: Option<String>,
    pub sequence_type: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateDatabaseResponse {
    pub id: String,
    #[serde(flatten)]
    pub metadata: DatabaseMetadata,
}

#[derive(Debug, thiserror::Error)]
pub enum UpdateDatabaseError {
    #[error(transparent)]
    Files(#[from] FileStoreError),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

impl From<UpdateDatabaseError> for AppError {
    fn from(err: UpdateDatabaseError) -> Self {
        match err {
            UpdateDatabaseError::Files(e) => e.into(),
            UpdateDatabaseError::Metadata(e) => e.into(),
        }
    }
}

#[tracing::instrument(skip(state))]
pub async fn handle(
    state: &FeatureState,
    command: UpdateDatabaseCommand,
) -> Result<UpdateDatabaseResponse, UpdateDatabaseError> {
    state.references.resolve_database(&command.db_id).await?;

    let update = DatabaseMetadata {
        species: command.species,
        genome_version: command.genome_version,
        sequence_type: command.sequence_type,
        description: command.description,
        ..Default::default()
    };
    let metadata = state.metadata.update(&command.db_id, update).await?;

    Ok(UpdateDatabaseResponse {
        id: command.db_id,
        metadata,
    })
}
