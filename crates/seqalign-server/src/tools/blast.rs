//! BLAST+ adapter
//!
//! Indexes with `makeblastdb`, searches with one of the BLAST+ search programs
//! in single-file JSON mode (`-outfmt 15`) and flattens every HSP of every hit
//! into one canonical [`Hit`].

use async_trait::async_trait;
use seqalign_common::types::{Hit, HitExtras, ToolKind};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

use super::process::ExternalCommand;
use super::{option_arg, result_artifact, with_suffix, ToolAdapter, ToolError, ToolOptions};

/// Search programs accepted through the `program` option
pub const BLAST_PROGRAMS: [&str; 5] = ["blastn", "blastp", "blastx", "tblastn", "tblastx"];

const DEFAULT_PROGRAM: &str = "blastn";
const DEFAULT_TASK: &str = "blastn";
const ARTIFACT_SUFFIX: &str = "blast.json";
const UNKNOWN_QUERY: &str = "Unknown";

#[derive(Debug, Clone, Default)]
pub struct BlastTool {
    bin_dir: Option<PathBuf>,
}

impl BlastTool {
    /// `bin_dir` holds the BLAST+ binaries; `None` resolves them through `PATH`
    pub fn new(bin_dir: Option<PathBuf>) -> Self {
        Self { bin_dir }
    }

    fn executable(&self, program: &str) -> PathBuf {
        match self.bin_dir {
            Some(ref dir) => dir.join(program),
            None => PathBuf::from(program),
        }
    }

    fn program_option(options: &ToolOptions) -> Result<String, ToolError> {
        let program = options
            .get("program")
            .and_then(option_arg)
            .unwrap_or_else(|| DEFAULT_PROGRAM.to_string());

        if !BLAST_PROGRAMS.contains(&program.as_str()) {
            return Err(ToolError::InvalidOption {
                name: "program".to_string(),
                message: format!(
                    "'{}' is not one of {}",
                    program,
                    BLAST_PROGRAMS.join(", ")
                ),
            });
        }
        Ok(program)
    }
}

#[async_trait]
impl ToolAdapter for BlastTool {
    fn kind(&self) -> ToolKind {
        ToolKind::ShortExact
    }

    /// makeblastdb writes its volume files next to the reference, under its name
    fn index_output(&self, reference: &Path) -> PathBuf {
        reference.to_path_buf()
    }

    fn index_marker(&self, reference: &Path) -> PathBuf {
        with_suffix(reference, "nin")
    }

    async fn index(&self, reference: &Path, output: &Path) -> bool {
        let command = ExternalCommand::new(self.executable("makeblastdb"))
            .arg("-in")
            .arg(reference)
            .arg("-dbtype")
            .arg("nucl")
            .arg("-out")
            .arg(output);

        match command.run().await {
            Ok(()) => {
                info!(reference = %reference.display(), "BLAST database built");
                true
            },
            Err(e) => {
                warn!(reference = %reference.display(), error = %e, "makeblastdb failed");
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
        let program = Self::program_option(options)?;
        let artifact = result_artifact(query, database, job_id, ARTIFACT_SUFFIX);

        let mut command = ExternalCommand::new(self.executable(&program))
            .arg("-query")
            .arg(query)
            .arg("-db")
            .arg(database)
            .arg("-outfmt")
            .arg("15")
            .arg("-out")
            .arg(&artifact);

        if let Some(evalue) = options.get("evalue").and_then(option_arg) {
            command = command.arg("-evalue").arg(evalue);
        }

        let task = options
            .get("task")
            .and_then(option_arg)
            .unwrap_or_else(|| DEFAULT_TASK.to_string());
        command = command.arg("-task").arg(task);

        command.run().await?;
        Ok(artifact)
    }

    async fn parse_result(&self, artifact: &Path) -> Result<Vec<Hit>, ToolError> {
        let bytes = match tokio::fs::read(artifact).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(ToolError::Io {
                    path: artifact.to_path_buf(),
                    source,
                })
            },
        };

        parse_blast_json(&bytes).map_err(|e| ToolError::Malformed {
            tool: ToolKind::ShortExact,
            path: artifact.to_path_buf(),
            message: e.to_string(),
        })
    }
}

// ============================================================================
// BLAST JSON (outfmt 15)
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct BlastDocument {
    #[serde(rename = "BlastOutput2", default)]
    outputs: Vec<BlastOutput>,
}

#[derive(Debug, Default, Deserialize)]
struct BlastOutput {
    #[serde(default)]
    report: Report,
}

#[derive(Debug, Default, Deserialize)]
struct Report {
    #[serde(default)]
    results: Results,
}

#[derive(Debug, Default, Deserialize)]
struct Results {
    #[serde(default)]
    search: Search,
}

#[derive(Debug, Default, Deserialize)]
struct Search {
    query_title: Option<String>,
    query_id: Option<String>,
    #[serde(default)]
    query_len: i64,
    #[serde(default)]
    hits: Vec<BlastHit>,
}

#[derive(Debug, Deserialize)]
struct BlastHit {
    #[serde(default)]
    description: Vec<Description>,
    /// A hit without HSPs still yields one all-default row
    #[serde(default = "single_empty_hsp")]
    hsps: Vec<Hsp>,
}

#[derive(Debug, Default, Deserialize)]
struct Description {
    #[serde(default)]
    accession: String,
    #[serde(default)]
    title: String,
}

#[derive(Debug, Default, Deserialize)]
struct Hsp {
    #[serde(default)]
    align_len: i64,
    #[serde(default)]
    identity: i64,
    #[serde(default)]
    gaps: i64,
    query_from: Option<i64>,
    query_to: Option<i64>,
    hit_from: Option<i64>,
    hit_to: Option<i64>,
    evalue: Option<f64>,
    bit_score: Option<f64>,
}

fn single_empty_hsp() -> Vec<Hsp> {
    vec![Hsp::default()]
}

/// Flatten a BLAST JSON document into hits, in document order
pub fn parse_blast_json(bytes: &[u8]) -> Result<Vec<Hit>, serde_json::Error> {
    let document: BlastDocument = serde_json::from_slice(bytes)?;
    let mut hits = Vec::new();

    for output in document.outputs {
        let search = output.report.results.search;
        let query_id = search
            .query_title
            .or(search.query_id)
            .unwrap_or_else(|| UNKNOWN_QUERY.to_string());

        for hit in search.hits {
            let description = hit.description.into_iter().next().unwrap_or_default();

            for hsp in hit.hsps {
                hits.push(hsp_to_hit(&query_id, search.query_len, &description, &hsp));
            }
        }
    }

    Ok(hits)
}

fn hsp_to_hit(query_id: &str, query_len: i64, description: &Description, hsp: &Hsp) -> Hit {
    let (percent_identity, mismatches) = if hsp.align_len > 0 {
        (
            round2(hsp.identity as f64 / hsp.align_len as f64 * 100.0),
            hsp.align_len - hsp.identity - hsp.gaps,
        )
    } else {
        (0.0, 0)
    };

    Hit {
        query_id: query_id.to_string(),
        subject_id: description.accession.clone(),
        percent_identity: Some(percent_identity),
        alignment_length: hsp.align_len,
        mismatches: Some(mismatches),
        gap_opens: Some(hsp.gaps),
        query_start: hsp.query_from,
        query_end: hsp.query_to,
        target_start: hsp.hit_from,
        target_end: hsp.hit_to,
        evalue: hsp.evalue,
        score: hsp.bit_score,
        database: None,
        extras: HitExtras::ShortExact {
            subject_title: description.title.clone(),
            query_length: query_len,
        },
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn report(hits: serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "BlastOutput2": [{
                "report": {
                    "program": "blastn",
                    "results": {
                        "search": {
                            "query_id": "Query_1",
                            "query_title": "read_42",
                            "query_len": 120,
                            "hits": hits
                        }
                    }
                }
            }]
        }))
        .unwrap()
    }

    #[test]
    fn test_identity_and_mismatch_formulas() {
        let bytes = report(json!([{
            "description": [{"accession": "NC_000001", "title": "chromosome 1"}],
            "hsps": [{
                "align_len": 80, "identity": 76, "gaps": 2,
                "query_from": 1, "query_to": 80, "hit_from": 1001, "hit_to": 1080,
                "evalue": 1e-30, "bit_score": 140.5
            }]
        }]));

        let hits = parse_blast_json(&bytes).unwrap();
        assert_eq!(hits.len(), 1);

        let hit = &hits[0];
        assert_eq!(hit.query_id, "read_42");
        assert_eq!(hit.subject_id, "NC_000001");
        assert_eq!(hit.percent_identity, Some(95.0));
        assert_eq!(hit.mismatches, Some(2));
        assert_eq!(hit.gap_opens, Some(2));
        assert_eq!(hit.target_start, Some(1001));
        assert_eq!(hit.score, Some(140.5));
        assert_eq!(
            hit.extras,
            HitExtras::ShortExact {
                subject_title: "chromosome 1".to_string(),
                query_length: 120
            }
        );
    }

    #[test]
    fn test_percent_identity_rounds_to_two_decimals() {
        let bytes = report(json!([{
            "description": [{"accession": "X"}],
            "hsps": [{"align_len": 3, "identity": 2, "gaps": 0, "bit_score": 10.0}]
        }]));
        let hits = parse_blast_json(&bytes).unwrap();
        assert_eq!(hits[0].percent_identity, Some(66.67));
    }

    #[test]
    fn test_zero_alignment_length() {
        let bytes = report(json!([{
            "description": [{"accession": "X"}],
            "hsps": [{"align_len": 0, "identity": 0, "gaps": 0}]
        }]));
        let hits = parse_blast_json(&bytes).unwrap();
        assert_eq!(hits[0].percent_identity, Some(0.0));
        assert_eq!(hits[0].mismatches, Some(0));
        assert_eq!(hits[0].score, None);
    }

    #[test]
    fn test_one_hit_per_hsp_in_document_order() {
        let bytes = report(json!([
            {
                "description": [{"accession": "A"}],
                "hsps": [
                    {"align_len": 10, "identity": 10, "gaps": 0, "bit_score": 20.0},
                    {"align_len": 10, "identity": 9, "gaps": 0, "bit_score": 15.0}
                ]
            },
            {
                "description": [{"accession": "B"}],
                "hsps": [{"align_len": 10, "identity": 8, "gaps": 0, "bit_score": 30.0}]
            }
        ]));

        let hits = parse_blast_json(&bytes).unwrap();
        let subjects: Vec<_> = hits.iter().map(|h| h.subject_id.as_str()).collect();
        assert_eq!(subjects, vec!["A", "A", "B"]);
    }

    #[test]
    fn test_missing_keys_take_defaults() {
        let bytes = serde_json::to_vec(&json!({
            "BlastOutput2": [{"report": {"results": {"search": {"hits": [{}]}}}}]
        }))
        .unwrap();

        let hits = parse_blast_json(&bytes).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].query_id, "Unknown");
        assert_eq!(hits[0].subject_id, "");
        assert_eq!(hits[0].alignment_length, 0);
    }

    #[test]
    fn test_no_hits() {
        assert!(parse_blast_json(&report(json!([]))).unwrap().is_empty());
        assert!(parse_blast_json(b"{}").unwrap().is_empty());
    }

    #[test]
    fn test_invalid_json_is_error() {
        assert!(parse_blast_json(b"{ not json").is_err());
    }

    #[tokio::test]
    async fn test_parse_result_missing_artifact_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let hits = BlastTool::default()
            .parse_result(&dir.path().join("absent.blast.json"))
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_parse_result_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("q.fa.db.fa.job.blast.json");
        std::fs::write(
            &artifact,
            report(json!([{
                "description": [{"accession": "A"}],
                "hsps": [{"align_len": 50, "identity": 49, "gaps": 1, "bit_score": 90.0}]
            }])),
        )
        .unwrap();

        let tool = BlastTool::default();
        let first = tool.parse_result(&artifact).await.unwrap();
        let second = tool.parse_result(&artifact).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_parse_result_malformed_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("broken.blast.json");
        std::fs::write(&artifact, "BLAST crashed halfway").unwrap();

        let err = BlastTool::default().parse_result(&artifact).await.unwrap_err();
        assert!(matches!(err, ToolError::Malformed { .. }));
    }

    /// blastn stand-in that reports its `-evalue` as the hit accession and then
    /// sleeps for that many seconds
    #[cfg(unix)]
    const SLOW_BLASTN: &str = r#"#!/bin/sh
out=""
evalue=""
while [ $# -gt 0 ]; do
  case "$1" in
    -out) out="$2"; shift 2 ;;
    -evalue) evalue="$2"; shift 2 ;;
    *) shift ;;
  esac
done
printf '{"BlastOutput2":[{"report":{"results":{"search":{"query_title":"q","hits":[{"description":[{"accession":"EVALUE_%s"}],"hsps":[{"align_len":10,"identity":10,"gaps":0,"bit_score":20.0}]}]}}}}]}' "$evalue" > "$out"
sleep "$evalue"
"#;

    #[cfg(unix)]
    #[tokio::test]
    async fn test_concurrent_jobs_on_same_query_and_database_keep_their_own_results() {
        use std::os::unix::fs::PermissionsExt;
        use std::time::Duration;

        let dir = tempfile::tempdir().unwrap();
        let bin_dir = dir.path().join("bin");
        std::fs::create_dir_all(&bin_dir).unwrap();
        let blastn = bin_dir.join("blastn");
        std::fs::write(&blastn, SLOW_BLASTN).unwrap();
        std::fs::set_permissions(&blastn, std::fs::Permissions::from_mode(0o755)).unwrap();

        let query = dir.path().join("reads.fa");
        let database = dir.path().join("hg38.fa");
        std::fs::write(&query, ">q\nACGT\n").unwrap();
        std::fs::write(&database, ">chr1\nACGT\n").unwrap();

        let tool = BlastTool::new(Some(bin_dir));
        let slow_options = ToolOptions::from([("evalue".to_string(), json!(1))]);
        let fast_options = ToolOptions::from([("evalue".to_string(), json!(0))]);

        let slow = async {
            let artifact = tool
                .search(Uuid::new_v4(), &query, &database, &slow_options)
                .await
                .unwrap();
            tool.parse_result(&artifact).await.unwrap()
        };
        let fast = async {
            tokio::time::sleep(Duration::from_millis(300)).await;
            let artifact = tool
                .search(Uuid::new_v4(), &query, &database, &fast_options)
                .await
                .unwrap();
            tool.parse_result(&artifact).await.unwrap()
        };

        let (slow_hits, fast_hits) = tokio::join!(slow, fast);
        assert_eq!(slow_hits[0].subject_id, "EVALUE_1");
        assert_eq!(fast_hits[0].subject_id, "EVALUE_0");
    }

    #[test]
    fn test_program_option_whitelist() {
        let mut options = ToolOptions::new();
        assert_eq!(BlastTool::program_option(&options).unwrap(), "blastn");

        options.insert("program".to_string(), json!("tblastx"));
        assert_eq!(BlastTool::program_option(&options).unwrap(), "tblastx");

        options.insert("program".to_string(), json!("rm"));
        assert!(matches!(
            BlastTool::program_option(&options),
            Err(ToolError::InvalidOption { .. })
        ));
    }

    #[tokio::test]
    async fn test_index_with_missing_binary_reports_false() {
        let dir = tempfile::tempdir().unwrap();
        let reference = dir.path().join("ref.fa");
        std::fs::write(&reference, ">r\nACGT\n").unwrap();

        let tool = BlastTool::new(Some(dir.path().join("no-such-bin")));
        assert!(!tool.index(&reference, &tool.index_output(&reference)).await);
    }

    #[test]
    fn test_index_marker() {
        let tool = BlastTool::default();
        assert_eq!(
            tool.index_marker(Path::new("/refs/chr1.fa")),
            PathBuf::from("/refs/chr1.fa.nin")
        );
        assert_eq!(tool.executable("blastn"), PathBuf::from("blastn"));
    }
}
