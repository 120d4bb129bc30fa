//! Descriptive database metadata
//!
//! A single YAML document maps database id to its description:
//!
//! ```yaml
//! hg38.fa:
//!   species: Homo sapiens
//!   genome_version: GRCh38
//!   sequence_type: genome
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Metadata file error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid metadata file {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub species: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genome_version: Option<String>,
    /// cds, protein, genome, transcript
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Keys written by other tools are kept as-is
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl DatabaseMetadata {
    /// Overlay the fields set in `update`
    pub fn merge(&mut self, update: DatabaseMetadata) {
        if update.species.is_some() {
            self.species = update.species;
        }
        if update.genome_version.is_some() {
            self.genome_version = update.genome_version;
        }
        if update.sequence_type.is_some() {
            self.sequence_type = update.sequence_type;
        }
        if update.description.is_some() {
            self.description = update.description;
        }
        self.extra.extend(update.extra);
    }
}

type MetadataDocument = BTreeMap<String, DatabaseMetadata>;

#[derive(Debug, Clone)]
pub struct MetadataStore {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl MetadataStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Metadata for `id`; empty when none was recorded
    pub async fn get(&self, id: &str) -> Result<DatabaseMetadata, MetadataError> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(id).unwrap_or_default())
    }

    /// Whole document, for listing many databases with one read
    pub async fn all(&self) -> Result<BTreeMap<String, DatabaseMetadata>, MetadataError> {
        let _guard = self.lock.lock().await;
        self.load().await
    }

    /// Merge `update` into the entry for `id`, creating it if needed
    pub async fn update(
        &self,
        id: &str,
        update: DatabaseMetadata,
    ) -> Result<DatabaseMetadata, MetadataError> {
        let _guard = self.lock.lock().await;
        let mut document = self.load().await?;

        let entry = document.entry(id.to_string()).or_default();
        entry.merge(update);
        let merged = entry.clone();

        self.save(&document).await?;
        debug!(database = %id, "Metadata updated");
        Ok(merged)
    }

    /// Drop the entry for `id`; a no-op when there is none
    pub async fn delete(&self, id: &str) -> Result<(), MetadataError> {
        let _guard = self.lock.lock().await;
        let mut document = self.load().await?;
        if document.remove(id).is_some() {
            self.save(&document).await?;
        }
        Ok(())
    }

    async fn load(&self) -> Result<MetadataDocument, MetadataError> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(MetadataDocument::new()),
            Err(source) => {
                return Err(MetadataError::Io {
                    path: self.path.clone(),
                    source,
                })
            },
        };

        if text.trim().is_empty() {
            return Ok(MetadataDocument::new());
        }

        serde_yaml::from_str(&text).map_err(|source| MetadataError::Yaml {
            path: self.path.clone(),
            source,
        })
    }

    async fn save(&self, document: &MetadataDocument) -> Result<(), MetadataError> {
        let text = serde_yaml::to_string(document).map_err(|source| MetadataError::Yaml {
            path: self.path.clone(),
            source,
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| MetadataError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        tokio::fs::write(&self.path, text)
            .await
            .map_err(|source| MetadataError::Io {
                path: self.path.clone(),
                source,
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn species(name: &str) -> DatabaseMetadata {
        DatabaseMetadata {
            species: Some(name.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::new(dir.path().join("databases.yaml"));
        assert_eq!(store.get("hg38.fa").await.unwrap(), DatabaseMetadata::default());
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::new(dir.path().join("nested/databases.yaml"));

        store.update("hg38.fa", species("Homo sapiens")).await.unwrap();
        let merged = store
            .update(
                "hg38.fa",
                DatabaseMetadata {
                    genome_version: Some("GRCh38".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(merged.species.as_deref(), Some("Homo sapiens"));
        assert_eq!(merged.genome_version.as_deref(), Some("GRCh38"));
        assert_eq!(store.get("hg38.fa").await.unwrap(), merged);
    }

    #[tokio::test]
    async fn test_delete_entry() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::new(dir.path().join("databases.yaml"));
        store.update("a.fa", species("E. coli")).await.unwrap();
        store.update("b.fa", species("S. cerevisiae")).await.unwrap();

        store.delete("a.fa").await.unwrap();
        store.delete("missing.fa").await.unwrap();

        let all = store.all().await.unwrap();
        assert!(!all.contains_key("a.fa"));
        assert!(all.contains_key("b.fa"));
    }

    #[tokio::test]
    async fn test_unknown_keys_survive_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("databases.yaml");
        std::fs::write(&path, "a.fa:\n  species: Mus musculus\n  curator: lab-7\n").unwrap();

        let store = MetadataStore::new(&path);
        store.update("a.fa", DatabaseMetadata {
            description: Some("mouse".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("curator: lab-7"));
        assert!(text.contains("description: mouse"));
    }

    #[tokio::test]
    async fn test_invalid_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("databases.yaml");
        std::fs::write(&path, "a.fa: [unclosed").unwrap();

        let store = MetadataStore::new(&path);
        assert!(matches!(store.get("a.fa").await, Err(MetadataError::Yaml { .. })));
    }
}
