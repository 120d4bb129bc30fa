//! Reference database API routes
//!
//! - `GET /api/databases` - List reference databases
//! - `PUT /api/databases/:db_id` - Update database metadata
//! - `DELETE /api/databases/:db_id` - Delete a database and its indexes
//! - `POST /api/databases/:db_id/index` - Queue an index build
//! - `POST /api/databases/reference` - Upload a new reference FASTA
//! - `POST /api/databases/upload` - Upload a query file

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};

use super::commands::{
    DeleteDatabaseCommand, IndexDatabaseCommand, UpdateDatabaseCommand, UploadFileCommand,
    UploadFileError, UploadTarget,
};
use crate::error::AppError;
use crate::features::FeatureState;

pub fn databases_routes(max_upload_bytes: usize) -> Router<FeatureState> {
    let uploads = Router::new()
        .route("/api/databases/reference", post(upload_reference))
        .route("/api/databases/upload", post(upload_query))
        .layer(DefaultBodyLimit::max(max_upload_bytes));

    Router::new()
        .route("/api/databases", get(list_databases))
        .route("/api/databases/", get(list_databases))
        .route(
            "/api/databases/:db_id",
            put(update_database).delete(delete_database),
        )
        .route("/api/databases/:db_id/index", post(index_database))
        .merge(uploads)
}

// ============================================================================
// Query Handlers (Read Operations)
// ============================================================================

async fn list_databases(State(state): State<FeatureState>) -> Result<Response, AppError> {
    let databases = super::queries::list::handle(&state).await?;
    Ok((StatusCode::OK, Json(databases)).into_response())
}

// ============================================================================
// Command Handlers (Write Operations)
// ============================================================================

async fn update_database(
    State(state): State<FeatureState>,
    Path(db_id): Path<String>,
    Json(mut command): Json<UpdateDatabaseCommand>,
) -> Result<Response, AppError> {
    command.db_id = db_id;
    let response = super::commands::update::handle(&state, command).await?;
    Ok((StatusCode::OK, Json(response)).into_response())
}

async fn delete_database(
    State(state): State<FeatureState>,
    Path(db_id): Path<String>,
) -> Result<Response, AppError> {
    let response = super::commands::delete::handle(&state, DeleteDatabaseCommand { db_id }).await?;
    Ok((StatusCode::OK, Json(response)).into_response())
}

/// Queue an index build
///
/// # Request Body
///
/// ```json
/// { "tool": "minimap2" }
/// ```
///
/// # Response
///
/// - `202 Accepted` - `{"job_id": "...", "state": "PENDING"}`
/// - `404 Not Found` - No such database
async fn index_database(
    State(state): State<FeatureState>,
    Path(db_id): Path<String>,
    Json(mut command): Json<IndexDatabaseCommand>,
) -> Result<Response, AppError> {
    command.db_id = db_id;
    let accepted = super::commands::index::handle(&state, command).await?;
    Ok((StatusCode::ACCEPTED, Json(accepted)).into_response())
}

async fn upload_reference(
    State(state): State<FeatureState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    upload(state, multipart, UploadTarget::Reference).await
}

async fn upload_query(
    State(state): State<FeatureState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    upload(state, multipart, UploadTarget::Query).await
}

#[tracing::instrument(skip(state, multipart))]
async fn upload(
    state: FeatureState,
    mut multipart: Multipart,
    target: UploadTarget,
) -> Result<Response, AppError> {
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| UploadFileError::Multipart(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| UploadFileError::Multipart(e.to_string()))?;
        file = Some((filename, data.to_vec()));
    }

    let (filename, content) = file.ok_or(UploadFileError::MissingFile)?;

    let command = UploadFileCommand {
        target,
        filename,
        content,
    };
    let stored = super::commands::upload::handle(&state, command).await?;

    tracing::info!(filename = %stored.filename, size = stored.size, "File uploaded");
    Ok((StatusCode::CREATED, Json(stored)).into_response())
}
