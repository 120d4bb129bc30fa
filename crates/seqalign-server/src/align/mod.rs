//! Multi-database fan-out and merge
//!
//! One alignment job runs the selected adapter against every requested
//! database in submission order, tags each hit with the database it came
//! from, and merges everything into one ranked list. Ranking and truncation
//! only ever happen on the merged whole.

use seqalign_common::types::{AlignmentReport, Hit, RunStatus, MAX_REPORTED_HITS};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::tools::{database_name, ToolAdapter, ToolError, ToolOptions};

/// A search or parse failure against one database aborts the whole job
#[derive(Debug, Error)]
#[error("Search against database '{database}' failed: {source}")]
pub struct FanOutError {
    pub database: String,
    #[source]
    pub source: ToolError,
}

/// Search `query` against each of `databases` for job `job_id` and merge the hits.
///
/// Databases are visited sequentially, duplicates included. The first failing
/// database stops the run and no partial report is produced.
#[tracing::instrument(
    skip(adapter, job_id, databases, options),
    fields(tool = %adapter.kind(), query = %query.display(), database_count = databases.len())
)]
pub async fn fan_out(
    adapter: &dyn ToolAdapter,
    job_id: Uuid,
    query: &Path,
    databases: &[PathBuf],
    options: &ToolOptions,
) -> Result<AlignmentReport, FanOutError> {
    let mut accumulated: Vec<Hit> = Vec::new();

    for database in databases {
        let name = database_name(database);

        let artifact = adapter
            .search(job_id, query, database, options)
            .await
            .map_err(|source| FanOutError {
                database: name.clone(),
                source,
            })?;

        let hits = adapter
            .parse_result(&artifact)
            .await
            .map_err(|source| FanOutError {
                database: name.clone(),
                source,
            })?;

        debug!(database = %name, hits = hits.len(), "Database searched");

        accumulated.extend(hits.into_iter().map(|mut hit| {
            hit.database = Some(name.clone());
            hit
        }));
    }

    let report = merge_hits(adapter, accumulated, databases);
    info!(hits_count = report.hits_count, "Alignment merged");
    Ok(report)
}

/// Rank accumulated hits and cap the list.
///
/// The sort is stable, so hits with equal scores keep accumulation order and
/// earlier-listed databases win ties.
pub fn merge_hits(
    adapter: &dyn ToolAdapter,
    mut hits: Vec<Hit>,
    databases: &[PathBuf],
) -> AlignmentReport {
    hits.sort_by(|a, b| b.rank_score().total_cmp(&a.rank_score()));

    let hits_count = hits.len();
    hits.truncate(MAX_REPORTED_HITS);

    AlignmentReport {
        status: RunStatus::Completed,
        tool: adapter.kind(),
        hits_count,
        hits,
        databases: databases.iter().map(|db| database_name(db)).collect(),
    }
}
