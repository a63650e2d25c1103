use std::io::ErrorKind;
use std::path::Path as FsPath;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use motorlot_core::AppError;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use crate::utils::upload::sanitize_filename;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeleteResponse {
    pub deleted: bool,
    pub key: String,
}

/// Delete an uploaded object
///
/// Keys of the form `bucket/filename` address the remote store. A bare file
/// name addresses an artifact in the local uploads directory.
#[utoipa::path(
    delete,
    path = "/api/v0/uploads/{key}",
    tag = "uploads",
    params(
        ("key" = String, Path, description = "Remote key (`bucket/filename`) or local file name")
    ),
    responses(
        (status = 200, description = "Object deleted", body = DeleteResponse),
        (status = 404, description = "Nothing was deleted", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(operation = "delete_upload"))]
pub async fn delete_upload(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>, HttpAppError> {
    let deleted = if key.contains('/') {
        state.upload.orchestrator.client().delete(&key).await
    } else {
        delete_local(&state.upload.local_uploads_dir, &key).await
    };

    if !deleted {
        return Err(AppError::NotFound(format!("No upload found for key {}", key)).into());
    }

    Ok(Json(DeleteResponse { deleted, key }))
}

async fn delete_local(dir: &FsPath, name: &str) -> bool {
    let safe_name = match sanitize_filename(name) {
        Ok(safe) if safe == name => safe,
        _ => {
            tracing::debug!(key = %name, "Refusing to delete unsafe local file name");
            return false;
        }
    };

    match tokio::fs::remove_file(dir.join(&safe_name)).await {
        Ok(()) => {
            tracing::info!(file = %safe_name, "Local upload deleted");
            true
        }
        Err(e) if e.kind() == ErrorKind::NotFound => false,
        Err(e) => {
            tracing::warn!(error = %e, file = %safe_name, "Local upload delete failed");
            false
        }
    }
}
