//! Reference and upload file storage
//!
//! Reference databases are FASTA files in one flat directory; their identifier
//! is the file name. Query files live in a separate upload directory. All
//! names coming from clients are checked by [`validate_file_name`] before they
//! touch the filesystem.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

pub mod metadata;

pub use metadata::{DatabaseMetadata, MetadataError, MetadataStore};

/// Extensions recognized as reference FASTA files
pub const FASTA_EXTENSIONS: [&str; 2] = ["fa", "fasta"];

const INLINE_QUERY_PREFIX: &str = "paste_";
const MAX_FILE_NAME_LEN: usize = 255;

#[derive(Debug, Error)]
pub enum FileStoreError {
    #[error("Invalid file name '{0}'")]
    InvalidName(String),

    #[error("Database '{0}' not found")]
    DatabaseNotFound(String),

    #[error("Upload '{0}' not found")]
    UploadNotFound(String),

    #[error("File storage error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FileStoreError {
    fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| FileStoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A stored file as reported back to clients
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StoredFile {
    pub filename: String,
    pub size: u64,
}

/// A reference FASTA found in the reference directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceFile {
    pub id: String,
    pub path: PathBuf,
    pub size: u64,
}

/// Reject anything that is not a single plain path component
pub fn validate_file_name(name: &str) -> Result<(), FileStoreError> {
    let invalid = name.is_empty()
        || name.len() > MAX_FILE_NAME_LEN
        || name == "."
        || name == ".."
        || name.starts_with('.')
        || name.contains(['/', '\\', '\0']);

    if invalid {
        return Err(FileStoreError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Whether `name` carries a FASTA extension
pub fn is_fasta(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| FASTA_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}

#[derive(Debug, Clone)]
pub struct ReferenceStore {
    reference_dir: PathBuf,
    upload_dir: PathBuf,
}

impl ReferenceStore {
    pub fn new(reference_dir: impl Into<PathBuf>, upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            reference_dir: reference_dir.into(),
            upload_dir: upload_dir.into(),
        }
    }

    pub fn reference_dir(&self) -> &Path {
        &self.reference_dir
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Create both directories if missing
    pub async fn ensure_dirs(&self) -> Result<(), FileStoreError> {
        for dir in [&self.reference_dir, &self.upload_dir] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(FileStoreError::io(dir))?;
        }
        Ok(())
    }

    /// Path of an existing reference database
    pub async fn resolve_database(&self, id: &str) -> Result<PathBuf, FileStoreError> {
        validate_file_name(id)?;
        let path = self.reference_dir.join(id);
        if !is_file(&path).await? {
            return Err(FileStoreError::DatabaseNotFound(id.to_string()));
        }
        Ok(path)
    }

    /// Path of an existing uploaded query file
    pub async fn resolve_upload(&self, filename: &str) -> Result<PathBuf, FileStoreError> {
        validate_file_name(filename)?;
        let path = self.upload_dir.join(filename);
        if !is_file(&path).await? {
            return Err(FileStoreError::UploadNotFound(filename.to_string()));
        }
        Ok(path)
    }

    /// Materialize an inline query sequence as `paste_<8 hex>.fasta`
    pub async fn write_inline_query(&self, sequence: &str) -> Result<PathBuf, FileStoreError> {
        let token = Uuid::new_v4().simple().to_string();
        let filename = format!("{}{}.fasta", INLINE_QUERY_PREFIX, &token[..8]);
        let path = self.upload_dir.join(filename);

        tokio::fs::write(&path, sequence)
            .await
            .map_err(FileStoreError::io(&path))?;

        debug!(path = %path.display(), "Inline query written");
        Ok(path)
    }

    /// Store an uploaded query file, replacing any file of the same name
    pub async fn save_upload(&self, filename: &str, bytes: &[u8]) -> Result<StoredFile, FileStoreError> {
        validate_file_name(filename)?;
        write_file(&self.upload_dir.join(filename), filename, bytes).await
    }

    /// Store an uploaded reference FASTA, replacing any file of the same name
    pub async fn save_reference(&self, filename: &str, bytes: &[u8]) -> Result<StoredFile, FileStoreError> {
        validate_file_name(filename)?;
        let stored = write_file(&self.reference_dir.join(filename), filename, bytes).await?;
        info!(database = %filename, size = stored.size, "Reference stored");
        Ok(stored)
    }

    /// FASTA files in the reference directory, sorted by name
    pub async fn list_references(&self) -> Result<Vec<ReferenceFile>, FileStoreError> {
        let mut entries = match tokio::fs::read_dir(&self.reference_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(FileStoreError::Io {
                    path: self.reference_dir.clone(),
                    source,
                })
            },
        };

        let mut references = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(FileStoreError::io(&self.reference_dir))?
        {
            let Ok(id) = entry.file_name().into_string() else {
                continue;
            };
            if !is_fasta(&id) {
                continue;
            }
            let metadata = entry.metadata().await.map_err(FileStoreError::io(&entry.path()))?;
            if !metadata.is_file() {
                continue;
            }
            references.push(ReferenceFile {
                id,
                path: entry.path(),
                size: metadata.len(),
            });
        }

        references.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(references)
    }

    /// Delete a reference and its index artifacts; returns every removed path
    pub async fn delete_reference(&self, id: &str) -> Result<Vec<PathBuf>, FileStoreError> {
        let path = self.resolve_database(id).await?;
        let mut removed = Vec::new();

        for artifact in self.index_artifacts(id).await? {
            tokio::fs::remove_file(&artifact)
                .await
                .map_err(FileStoreError::io(&artifact))?;
            removed.push(artifact);
        }

        tokio::fs::remove_file(&path)
            .await
            .map_err(FileStoreError::io(&path))?;
        removed.push(path);

        info!(database = %id, files = removed.len(), "Reference deleted");
        Ok(removed)
    }

    /// Files named `<id>.<suffix>` that an index build produced: BLAST
    /// nucleotide volumes (`.n??`, possibly numbered) and minimap2 `.mmi`
    async fn index_artifacts(&self, id: &str) -> Result<Vec<PathBuf>, FileStoreError> {
        let prefix = format!("{}.", id);
        let mut entries = tokio::fs::read_dir(&self.reference_dir)
            .await
            .map_err(FileStoreError::io(&self.reference_dir))?;

        let mut artifacts = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(FileStoreError::io(&self.reference_dir))?
        {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            let Some(suffix) = name.strip_prefix(&prefix) else {
                continue;
            };
            if is_index_suffix(suffix) {
                artifacts.push(entry.path());
            }
        }

        artifacts.sort();
        Ok(artifacts)
    }
}

fn is_index_suffix(suffix: &str) -> bool {
    let ext = suffix.rsplit('.').next().unwrap_or(suffix);
    let numbered_volume = suffix
        .split('.')
        .rev()
        .skip(1)
        .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()));

    suffix == "mmi" || (numbered_volume && ext.len() == 3 && ext.starts_with('n'))
}

async fn is_file(path: &Path) -> Result<bool, FileStoreError> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) => Ok(metadata.is_file()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(FileStoreError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

async fn write_file(path: &Path, filename: &str, bytes: &[u8]) -> Result<StoredFile, FileStoreError> {
    tokio::fs::write(path, bytes)
        .await
        .map_err(FileStoreError::io(path))?;
    Ok(StoredFile {
        filename: filename.to_string(),
        size: bytes.len() as u64,
    })
}
