//! Feature modules implementing the SeqAlign API
//!
//! Each feature is a vertical slice with its own commands (writes), queries
//! (reads) and routes:
//!
//! - **databases**: reference listing, metadata, indexing, uploads
//! - **jobs**: alignment submission and job status
//! - **tools**: the supported aligners

pub mod databases;
pub mod jobs;
pub mod tools;

use axum::Router;
use std::sync::Arc;

use crate::jobs::{JobQueue, JobTracker};
use crate::references::{MetadataStore, ReferenceStore};
use crate::tools::Toolbox;

/// Shared state for all feature routes
#[derive(Clone)]
pub struct FeatureState {
    /// Reference and upload directories
    pub references: ReferenceStore,
    /// Database descriptions
    pub metadata: MetadataStore,
    /// Job state reads and PENDING writes
    pub tracker: JobTracker,
    /// Where submissions are pushed
    pub queue: Arc<dyn JobQueue>,
    /// Used for index locations and markers; searches run in the workers
    pub toolbox: Arc<Toolbox>,
}

/// Creates the API router with all feature routes mounted under `/api`
///
/// `max_upload_bytes` caps the multipart upload endpoints.
pub fn router(state: FeatureState, max_upload_bytes: usize) -> Router<()> {
    Router::new()
        .merge(databases::databases_routes(max_upload_bytes))
        .merge(jobs::jobs_routes())
        .merge(tools::tools_routes())
        .with_state(state)
}
