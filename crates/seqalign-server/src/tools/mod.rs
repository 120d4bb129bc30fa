//! Tool adapters
//!
//! Each external aligner is driven through the same three operations:
//!
//! - `index` builds the tool's on-disk index for a reference FASTA and reports
//!   success as a plain `bool`; failures are logged, never raised.
//! - `search` runs the aligner for one query against one database on behalf of
//!   one job and returns the path of the raw result artifact. A failing run is
//!   an error.
//! - `parse_result` normalizes the artifact into canonical [`Hit`]s. A missing
//!   artifact yields an empty list.
//!
//! The [`Toolbox`] maps a [`ToolKind`] to its adapter and is built once at
//! startup from [`ToolsConfig`](crate::config::ToolsConfig).

use async_trait::async_trait;
use seqalign_common::types::{Hit, ToolKind};
use serde_json::Value;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::config::ToolsConfig;

pub mod blast;
pub mod minimap2;
pub mod process;

pub use blast::BlastTool;
pub use minimap2::Minimap2Tool;

/// Free-form per-job options, forwarded to the selected tool
pub type ToolOptions = BTreeMap<String, Value>;

/// Errors raised while searching or parsing results
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    ProcessFailed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed {tool} output in {path}: {message}")]
    Malformed {
        tool: ToolKind,
        path: PathBuf,
        message: String,
    },

    #[error("Invalid option '{name}': {message}")]
    InvalidOption { name: String, message: String },
}

/// Uniform capability interface over an external aligner
#[async_trait]
pub trait ToolAdapter: Send + Sync {
    fn kind(&self) -> ToolKind;

    /// Where `index` writes its output for `reference`
    fn index_output(&self, reference: &Path) -> PathBuf;

    /// File whose presence means `reference` is indexed for this tool
    fn index_marker(&self, reference: &Path) -> PathBuf;

    async fn index(&self, reference: &Path, output: &Path) -> bool;

    async fn search(
        &self,
        job_id: Uuid,
        query: &Path,
        database: &Path,
        options: &ToolOptions,
    ) -> Result<PathBuf, ToolError>;

    async fn parse_result(&self, artifact: &Path) -> Result<Vec<Hit>, ToolError>;
}

/// Adapter registry keyed by [`ToolKind`]
#[derive(Clone)]
pub struct Toolbox {
    short_exact: Arc<dyn ToolAdapter>,
    long_read: Arc<dyn ToolAdapter>,
}

impl Toolbox {
    /// Build the production adapters from configuration
    pub fn new(config: &ToolsConfig) -> Self {
        Self {
            short_exact: Arc::new(BlastTool::new(config.blast_bin_dir.clone())),
            long_read: Arc::new(Minimap2Tool::new(config.minimap2_path.clone())),
        }
    }

    /// Build a toolbox from arbitrary adapters
    pub fn with_adapters(short_exact: Arc<dyn ToolAdapter>, long_read: Arc<dyn ToolAdapter>) -> Self {
        Self {
            short_exact,
            long_read,
        }
    }

    pub fn adapter(&self, tool: ToolKind) -> &dyn ToolAdapter {
        match tool {
            ToolKind::ShortExact => self.short_exact.as_ref(),
            ToolKind::LongRead => self.long_read.as_ref(),
        }
    }
}

impl std::fmt::Debug for Toolbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Toolbox")
            .field("short_exact", &self.short_exact.kind())
            .field("long_read", &self.long_read.kind())
            .finish()
    }
}

/// Base name of a database path, used to tag hits and name artifacts
pub fn database_name(database: &Path) -> String {
    database
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| database.display().to_string())
}

/// `<query>.<database name>.<job id>.<suffix>`, next to the query file.
///
/// The database name separates the artifacts of one multi-database job; the
/// job id separates concurrent jobs sharing an uploaded query and database.
pub fn result_artifact(query: &Path, database: &Path, job_id: Uuid, suffix: &str) -> PathBuf {
    let mut name: OsString = query.as_os_str().to_owned();
    name.push(format!(
        ".{}.{}.{}",
        database_name(database),
        job_id.simple(),
        suffix
    ));
    PathBuf::from(name)
}

/// `<path>.<suffix>`
pub(crate) fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

/// Render an option value as a single command-line argument.
///
/// `null` counts as "not given".
pub(crate) fn option_arg(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}
