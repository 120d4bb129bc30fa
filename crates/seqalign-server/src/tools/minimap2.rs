//! minimap2 adapter
//!
//! Searches write PAF to the result artifact; the first twelve PAF columns are
//! mapped onto the canonical hit schema.

use async_trait::async_trait;
use seqalign_common::types::{Hit, HitExtras, ToolKind};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

use super::process::ExternalCommand;
use super::{option_arg, result_artifact, with_suffix, ToolAdapter, ToolError, ToolOptions};

const ARTIFACT_SUFFIX: &str = "mm2.paf";
const PAF_MANDATORY_COLUMNS: usize = 12;

#[derive(Debug, Clone)]
pub struct Minimap2Tool {
    executable: PathBuf,
}

impl Default for Minimap2Tool {
    fn default() -> Self {
        Self::new(PathBuf::from("minimap2"))
    }
}

impl Minimap2Tool {
    pub fn new(executable: PathBuf) -> Self {
        Self { executable }
    }
}

#[async_trait]
impl ToolAdapter for Minimap2Tool {
    fn kind(&self) -> ToolKind {
        ToolKind::LongRead
    }

    fn index_output(&self, reference: &Path) -> PathBuf {
        with_suffix(reference, "mmi")
    }

    fn index_marker(&self, reference: &Path) -> PathBuf {
        self.index_output(reference)
    }

    async fn index(&self, reference: &Path, output: &Path) -> bool {
        let command = ExternalCommand::new(&self.executable)
            .arg("-d")
            .arg(output)
            .arg(reference);

        match command.run().await {
            Ok(()) => {
                info!(reference = %reference.display(), "minimap2 index built");
                true
            },
            Err(e) => {
                warn!(reference = %reference.display(), error = %e, "minimap2 indexing failed");
                false
            },
        }
    }

    async fn search(
        &self,
        job_id: Uuid,
        query: &Path,
        database: &Path,
        options: &ToolOptions,
    ) -> Result<PathBuf, ToolError> {
        let artifact = result_artifact(query, database, job_id, ARTIFACT_SUFFIX);

        let mut command = ExternalCommand::new(&self.executable).arg("-c");
        if let Some(preset) = options
            .get("preset")
            .and_then(option_arg)
            .filter(|preset| !preset.is_empty())
        {
            command = command.arg("-x").arg(preset);
        }

        command
            .arg(database)
            .arg(query)
            .stdout_to(&artifact)
            .run()
            .await?;

        Ok(artifact)
    }

    async fn parse_result(&self, artifact: &Path) -> Result<Vec<Hit>, ToolError> {
        let text = match tokio::fs::read_to_string(artifact).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(ToolError::Io {
                    path: artifact.to_path_buf(),
                    source,
                })
            },
        };

        parse_paf(&text).map_err(|message| ToolError::Malformed {
            tool: ToolKind::LongRead,
            path: artifact.to_path_buf(),
            message,
        })
    }
}

/// Parse PAF text into hits, one per line with at least twelve columns
pub fn parse_paf(text: &str) -> Result<Vec<Hit>, String> {
    let mut hits = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        let cols: Vec<&str> = line.trim().split('\t').collect();
        if cols.len() < PAF_MANDATORY_COLUMNS {
            continue;
        }

        let int = |idx: usize| -> Result<i64, String> {
            cols[idx].parse::<i64>().map_err(|_| {
                format!(
                    "line {}: column {} is not an integer: '{}'",
                    line_no + 1,
                    idx + 1,
                    cols[idx]
                )
            })
        };

        let query_length = int(1)?;
        let query_start = int(2)?;
        let query_end = int(3)?;
        let target_length = int(6)?;
        let target_start = int(7)?;
        let target_end = int(8)?;
        let residue_matches = int(9)?;
        let block_length = int(10)?;
        let mapq = int(11)?;

        hits.push(Hit {
            query_id: cols[0].to_string(),
            subject_id: cols[5].to_string(),
            percent_identity: None,
            alignment_length: block_length,
            mismatches: None,
            gap_opens: None,
            query_start: Some(query_start),
            query_end: Some(query_end),
            target_start: Some(target_start),
            target_end: Some(target_end),
            evalue: None,
            score: Some(mapq as f64),
            database: None,
            extras: HitExtras::LongRead {
                query_length,
                target_length,
                strand: cols[4].to_string(),
                residue_matches,
                block_length,
            },
        });
    }

    Ok(hits)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const ROW: &str = "read1\t1000\t10\t990\t+\tchr1\t248956422\t5000\t5980\t950\t985\t60\tNM:i:35\ttp:A:P";

    #[test]
    fn test_parse_paf_row() {
        let hits = parse_paf(&format!("{ROW}\n")).unwrap();
        assert_eq!(hits.len(), 1);

        let hit = &hits[0];
        assert_eq!(hit.query_id, "read1");
        assert_eq!(hit.subject_id, "chr1");
        assert_eq!(hit.alignment_length, 985);
        assert_eq!(hit.query_start, Some(10));
        assert_eq!(hit.target_end, Some(5980));
        assert_eq!(hit.score, Some(60.0));
        assert_eq!(hit.percent_identity, None);
        assert_eq!(hit.mismatches, None);
        assert_eq!(hit.gap_opens, None);
        assert_eq!(hit.evalue, None);
        assert_eq!(
            hit.extras,
            HitExtras::LongRead {
                query_length: 1000,
                target_length: 248956422,
                strand: "+".to_string(),
                residue_matches: 950,
                block_length: 985,
            }
        );
    }

    #[test]
    fn test_short_lines_are_skipped() {
        let text = format!("{ROW}\nread2\t500\t0\t100\t-\tchr2\t1000\t0\t100\t90\t100\n\n");
        let hits = parse_paf(&text).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].query_id, "read1");
    }

    #[test]
    fn test_non_integer_column_is_error() {
        let row = "read1\t1000\t10\t990\t+\tchr1\t2489\t5000\t5980\t950\tlots\t60";
        let err = parse_paf(row).unwrap_err();
        assert!(err.contains("column 11"));
    }

    #[test]
    fn test_empty_artifact() {
        assert!(parse_paf("").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_parse_result_missing_artifact_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let hits = Minimap2Tool::default()
            .parse_result(&dir.path().join("q.fa.ref.fa.mm2.paf"))
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_parse_result_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("q.fa.ref.fa.job.mm2.paf");
        std::fs::write(
            &artifact,
            format!("{ROW}\nread2\t500\t0\t480\t-\tchr2\t90000\t100\t580\t470\t480\t12\n"),
        )
        .unwrap();

        let tool = Minimap2Tool::default();
        let first = tool.parse_result(&artifact).await.unwrap();
        let second = tool.parse_result(&artifact).await.unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
    }

    #[test]
    fn test_index_output() {
        let tool = Minimap2Tool::default();
        assert_eq!(
            tool.index_output(Path::new("/refs/hg38.fa")),
            PathBuf::from("/refs/hg38.fa.mmi")
        );
    }

    #[tokio::test]
    async fn test_index_with_missing_binary_reports_false() {
        let dir = tempfile::tempdir().unwrap();
        let reference = dir.path().join("ref.fa");
        std::fs::write(&reference, ">r\nACGT\n").unwrap();

        let tool = Minimap2Tool::new(dir.path().join("missing-minimap2"));
        assert!(!tool.index(&reference, &tool.index_output(&reference)).await);
    }
}
