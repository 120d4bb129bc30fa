use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::features::FeatureState;
use crate::references::{is_fasta, validate_file_name, FileStoreError, StoredFile};

/// Where an uploaded file goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadTarget {
    /// Query file for later alignment jobs
    Query,
    /// New reference database
    Reference,
}

#[derive(Debug, Clone)]
pub struct UploadFileCommand {
    pub target: UploadTarget,
    pub filename: String,
    pub content: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum UploadFileError {
    #[error("No file field found in multipart data")]
    MissingFile,
    #[error("Failed to read upload: {0}")]
    Multipart(String),
    #[error("Reference databases must be FASTA files (.fa or .fasta), got '{0}'")]
    NotFasta(String),
    #[error(transparent)]
    Files(#[from] FileStoreError),
}

impl From<UploadFileError> for AppError {
    fn from(err: UploadFileError) -> Self {
        match err {
            UploadFileError::Files(e) => e.into(),
            other => AppError::Validation(other.to_string()),
        }
    }
}

impl UploadFileCommand {
    pub fn validate(&self) -> Result<(), UploadFileError> {
        validate_file_name(&self.filename)?;
        if self.target == UploadTarget::Reference && !is_fasta(&self.filename) {
            return Err(UploadFileError::NotFasta(self.filename.clone()));
        }
        Ok(())
    }
}

#[tracing::instrument(skip(state, command), fields(target = ?command.target, filename = %command.filename, size = command.content.len()))]
pub async fn handle(state: &FeatureState, command: UploadFileCommand) -> Result<StoredFile, UploadFileError> {
    command.validate()?;

    let stored = match command.target {
        UploadTarget::Query => {
            state
                .references
                .save_upload(&command.filename, &command.content)
                .await?
        },
        UploadTarget::Reference => {
            state
                .references
                .save_reference(&command.filename, &command.content)
                .await?
        },
    };

    Ok(stored)
}
