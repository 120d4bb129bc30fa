//! SeqAlign Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared wire types, logging setup, and error handling for the SeqAlign workspace.
//!
//! # Overview
//!
//! - **Types**: the canonical hit record, job states, and the job result payloads
//!   that travel between the API, the job store, and the workers
//! - **Logging**: tracing subscriber initialization driven by `LOG_*` variables
//! - **Error Handling**: the shared error type for parsing wire values
//!
//! # Example
//!
//! ```no_run
//! use seqalign_common::types::{JobState, ToolKind};
//!
//! let tool: ToolKind = "minimap2".parse().unwrap();
//! assert_eq!(tool, ToolKind::LongRead);
//! assert!(JobState::Success.is_terminal());
//! ```

pub mod error;
pub mod logging;
pub mod types;

pub use error::{Result, SeqAlignError};
