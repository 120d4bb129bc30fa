//! SeqAlign Server Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Asynchronous sequence-alignment service: BLAST and minimap2 searches run as
//! background jobs behind an HTTP API.
//!
//! # Overview
//!
//! - **Tools**: adapters that build indexes, run searches, and parse each
//!   aligner's output into the canonical hit record
//! - **Align**: fan-out of one query over several databases and the ranked merge
//! - **Jobs**: job records, the state machine, the queue and the worker pool
//! - **References**: reference FASTA files, uploads, and per-database metadata
//! - **API**: axum routes organized as feature slices
//!
//! # Architecture
//!
//! Features follow the command/query split:
//!
//! - **Commands** (write operations) validate their input, touch the stores,
//!   and queue jobs. Submission only ever creates a PENDING record.
//! - **Queries** (read operations) read job records and reference listings.
//!
//! Workers move a job PENDING -> STARTED -> SUCCESS/FAILURE and nothing else
//! writes a record after it reaches a terminal state.
//!
//! # Process modes
//!
//! `seqalign-server serve` runs the API. With `QUEUE_BACKEND=local` it also runs
//! apalis workers over in-memory storage; with `QUEUE_BACKEND=postgres` jobs go
//! through apalis storage in PostgreSQL and are executed by
//! `seqalign-server worker` processes.

pub mod align;
pub mod api;
pub mod config;
pub mod error;
pub mod features;
pub mod jobs;
pub mod middleware;
pub mod references;
pub mod tools;
