//! Job API routes
//!
//! - `POST /api/jobs` - Submit an alignment job
//! - `GET /api/jobs/:job_id` - Poll a job's state

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use super::{
    commands::SubmitAlignmentCommand,
    queries::GetJobQuery,
};
use crate::error::AppError;
use crate::features::FeatureState;

pub fn jobs_routes() -> Router<FeatureState> {
    Router::new()
        .route("/api/jobs", post(submit_job))
        .route("/api/jobs/", post(submit_job))
        .route("/api/jobs/:job_id", get(get_job))
}

/// Submit an alignment job
///
/// # Request Body
///
/// ```json
/// {
///   "query_sequence": ">read1\nACGT...",
///   "db_ids": ["hg38.fa", "mm10.fa"],
///   "tool": "shortExact",
///   "options": {"evalue": 1e-5}
/// }
/// ```
///
/// # Response
///
/// - `202 Accepted` - `{"job_id": "...", "state": "PENDING"}`
/// - `400 Bad Request` - Validation error
/// - `404 Not Found` - Unknown database or query file
async fn submit_job(
    State(state): State<FeatureState>,
    Json(command): Json<SubmitAlignmentCommand>,
) -> Result<Response, AppError> {
    let accepted = super::commands::submit::handle(&state, command).await?;
    Ok((StatusCode::ACCEPTED, Json(accepted)).into_response())
}

/// Get a job's state, with its result on SUCCESS or its error on FAILURE
async fn get_job(
    State(state): State<FeatureState>,
    Path(job_id): Path<String>,
) -> Result<Response, AppError> {
    let view = super::queries::get_job::handle(&state.tracker, GetJobQuery { job_id }).await?;
    Ok((StatusCode::OK, Json(view)).into_response())
}
