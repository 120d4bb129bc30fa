//! Job state storage
//!
//! [`JobStore`] is plain keyed persistence; the state machine lives in
//! [`JobTracker`](super::tracker::JobTracker). Records are written by the API
//! process (PENDING) and by whichever process runs the worker, so the file
//! store is the one to use when those are separate processes.

use async_trait::async_trait;
use seqalign_common::types::JobState;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::models::JobRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Job store IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt job record {job_id}: {source}")]
    Corrupt {
        job_id: Uuid,
        #[source]
        source: serde_json::Error,
    },

    #[error("Job {job_id} cannot move from {from} to {to}")]
    InvalidTransition {
        job_id: Uuid,
        from: JobState,
        to: JobState,
    },
}

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn load(&self, job_id: Uuid) -> Result<Option<JobRecord>, StoreError>;

    async fn save(&self, record: &JobRecord) -> Result<(), StoreError>;
}

// ============================================================================
// File-backed store
// ============================================================================

/// One JSON document per job under a directory
#[derive(Debug, Clone)]
pub struct FileJobStore {
    dir: PathBuf,
}

impl FileJobStore {
    /// Open the store, creating `dir` if needed
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| StoreError::Io {
                path: dir.clone(),
                source,
            })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, job_id: Uuid) -> PathBuf {
        self.dir.join(format!("{}.json", job_id))
    }
}

#[async_trait]
impl JobStore for FileJobStore {
    async fn load(&self, job_id: Uuid) -> Result<Option<JobRecord>, StoreError> {
        let path = self.record_path(job_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StoreError::Corrupt { job_id, source })
    }

    /// Write to a sibling temp file and rename over the record so readers never
    /// see a half-written document
    async fn save(&self, record: &JobRecord) -> Result<(), StoreError> {
        let path = self.record_path(record.job_id);
        let tmp = self.dir.join(format!(".{}.json.tmp", record.job_id));

        let bytes = serde_json::to_vec_pretty(record).map_err(|source| StoreError::Corrupt {
            job_id: record.job_id,
            source,
        })?;

        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|source| StoreError::Io {
                path: tmp.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|source| StoreError::Io { path, source })?;

        Ok(())
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// Process-local store for tests and single-process deployments
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    records: RwLock<HashMap<Uuid, JobRecord>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn load(&self, job_id: Uuid) -> Result<Option<JobRecord>, StoreError> {
        Ok(self.records.read().await.get(&job_id).cloned())
    }

    async fn save(&self, record: &JobRecord) -> Result<(), StoreError> {
        self.records
            .write()
            .await
            .insert(record.job_id, record.clone());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use seqalign_common::types::JobKind;

    #[tokio::test]
    async fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileJobStore::open(dir.path().join("jobs")).await.unwrap();

        let record = JobRecord::pending(Uuid::new_v4(), JobKind::Alignment);
        store.save(&record).await.unwrap();

        let loaded = store.load(record.job_id).await.unwrap().unwrap();
        assert_eq!(loaded, record);
        assert!(store.dir().join(format!("{}.json", record.job_id)).exists());
    }

    #[tokio::test]
    async fn test_file_store_unknown_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileJobStore::open(dir.path()).await.unwrap();
        assert!(store.load(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_corrupt_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileJobStore::open(dir.path()).await.unwrap();
        let id = Uuid::new_v4();
        std::fs::write(dir.path().join(format!("{id}.json")), "{").unwrap();

        assert!(matches!(
            store.load(id).await,
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[tokio::test]
    async fn test_memory_store_overwrites() {
        let store = MemoryJobStore::new();
        let mut record = JobRecord::pending(Uuid::new_v4(), JobKind::Index);
        store.save(&record).await.unwrap();

        record.state = JobState::Started;
        store.save(&record).await.unwrap();

        let loaded = store.load(record.job_id).await.unwrap().unwrap();
        assert_eq!(loaded.state, JobState::Started);
    }
}
