use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::AppError;
use crate::features::FeatureState;
use crate::references::{FileStoreError, MetadataError};
use seqalign_common::types::ToolKind;

/// One reference database as shown to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseInfo {
    pub id: String,
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    /// Whether at least one tool has an index
    pub indexed: bool,
    /// Program names (`blast`, `minimap2`) with an index present
    pub tools: Vec<String>,
    pub species: Option<String>,
    pub genome_version: Option<String>,
    pub sequence_type: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ListDatabasesError {
    #[error(transparent)]
    Files(#[from] FileStoreError),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

impl From<ListDatabasesError> for AppError {
    fn from(err: ListDatabasesError) -> Self {
        match err {
            ListDatabasesError::Files(e) => e.into(),
            ListDatabasesError::Metadata(e) => e.into(),
        }
    }
}

/// Scan the reference directory and join in index state and metadata
#[tracing::instrument(skip(state))]
pub async fn handle(state: &FeatureState) -> Result<Vec<DatabaseInfo>, ListDatabasesError> {
    let references = state.references.list_references().await?;
    let mut metadata = state.metadata.all().await?;

    let mut databases = Vec::with_capacity(references.len());
    for reference in references {
        let mut tools = Vec::new();
        for kind in ToolKind::ALL {
            let marker = state.toolbox.adapter(kind).index_marker(&reference.path);
            if tokio::fs::try_exists(&marker).await.unwrap_or(false) {
                tools.push(kind.program_name().to_string());
            }
        }

        let meta = metadata.remove(&reference.id).unwrap_or_default();
        databases.push(DatabaseInfo {
            name: reference.id.clone(),
            id: reference.id,
            path: reference.path,
            size: reference.size,
            indexed: !tools.is_empty(),
            tools,
            species: meta.species,
            genome_version: meta.genome_version,
            sequence_type: meta.sequence_type,
            description: meta.description,
        });
    }

    Ok(databases)
}
