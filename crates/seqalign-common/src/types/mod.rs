//! Wire types shared by the API, the job store, and the workers

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::SeqAlignError;

/// Maximum number of hits returned in an alignment report.
pub const MAX_REPORTED_HITS: usize = 100;

// ============================================================================
// Tools
// ============================================================================

/// The closed set of alignment tools the service can drive.
///
/// Serialized as `shortExact` / `longRead`; the historical names `blast` and
/// `minimap2` are accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToolKind {
    /// BLAST+ (`makeblastdb` / `blastn`)
    #[serde(rename = "shortExact", alias = "blast")]
    ShortExact,
    /// minimap2
    #[serde(rename = "longRead", alias = "minimap2")]
    LongRead,
}

impl ToolKind {
    pub const ALL: [ToolKind; 2] = [ToolKind::ShortExact, ToolKind::LongRead];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::ShortExact => "shortExact",
            ToolKind::LongRead => "longRead",
        }
    }

    /// Name of the underlying program family
    pub fn program_name(&self) -> &'static str {
        match self {
            ToolKind::ShortExact => "blast",
            ToolKind::LongRead => "minimap2",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ToolKind::ShortExact => "Nucleotide-Nucleotide BLAST (blastn)",
            ToolKind::LongRead => "Fast pairwise alignment for long sequences",
        }
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ToolKind {
    type Err = SeqAlignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shortExact" | "blast" => Ok(ToolKind::ShortExact),
            "longRead" | "minimap2" => Ok(ToolKind::LongRead),
            other => Err(SeqAlignError::UnknownTool(other.to_string())),
        }
    }
}

// ============================================================================
// Job state
// ============================================================================

/// Lifecycle state of a queued job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Pending,
    Started,
    Success,
    Failure,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "PENDING",
            JobState::Started => "STARTED",
            JobState::Success => "SUCCESS",
            JobState::Failure => "FAILURE",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Success | JobState::Failure)
    }

    /// Whether the state machine allows moving from `self` to `next`
    pub fn can_transition_to(&self, next: JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Pending, JobState::Started)
                | (JobState::Started, JobState::Success)
                | (JobState::Started, JobState::Failure)
        )
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobState {
    type Err = SeqAlignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PENDING" => Ok(JobState::Pending),
            "STARTED" => Ok(JobState::Started),
            "SUCCESS" => Ok(JobState::Success),
            "FAILURE" => Ok(JobState::Failure),
            _ => Err(SeqAlignError::InvalidState(s.to_string())),
        }
    }
}

/// What a job does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Alignment,
    Index,
}

// ============================================================================
// Hits
// ============================================================================

/// One alignment in the canonical schema both tools are normalized into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub query_id: String,
    pub subject_id: String,
    pub percent_identity: Option<f64>,
    pub alignment_length: i64,
    pub mismatches: Option<i64>,
    pub gap_opens: Option<i64>,
    pub query_start: Option<i64>,
    pub query_end: Option<i64>,
    pub target_start: Option<i64>,
    pub target_end: Option<i64>,
    pub evalue: Option<f64>,
    /// Bitscore for BLAST, mapping quality for minimap2
    pub score: Option<f64>,
    /// Base name of the database the hit came from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    pub extras: HitExtras,
}

impl Hit {
    /// Score used for ranking; a missing score ranks as zero
    pub fn rank_score(&self) -> f64 {
        self.score.unwrap_or(0.0)
    }
}

/// Fields only one of the tools reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "camelCase")]
pub enum HitExtras {
    ShortExact {
        subject_title: String,
        query_length: i64,
    },
    LongRead {
        query_length: i64,
        target_length: i64,
        strand: String,
        residue_matches: i64,
        block_length: i64,
    },
}

// ============================================================================
// Job results
// ============================================================================

/// Outcome label carried inside result payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
    Failed,
}

/// Payload of a successful alignment job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentReport {
    pub status: RunStatus,
    pub tool: ToolKind,
    /// Number of hits before truncation
    pub hits_count: usize,
    /// Merged hits, best first, at most [`MAX_REPORTED_HITS`]
    pub hits: Vec<Hit>,
    /// Base names of the queried databases, in submission order
    pub databases: Vec<String>,
}

/// Payload of a finished index job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexReport {
    pub status: RunStatus,
    pub tool: ToolKind,
    pub path: PathBuf,
}

/// Result stored with a SUCCESS job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobResult {
    Alignment(AlignmentReport),
    Index(IndexReport),
}
