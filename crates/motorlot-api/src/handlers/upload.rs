use std::sync::Arc;

use axum::{
    extract::{Multipart, Query, State},
    Json,
};
use motorlot_core::models::{BatchUploadResponse, RejectedPart, UploadResponse};
use motorlot_core::{AppError, Bucket, UploadedImage};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::constants::{BATCH_UPLOAD_FIELD, SINGLE_UPLOAD_FIELD};
use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

#[derive(Debug, Deserialize, IntoParams)]
pub struct BucketQuery {
    /// Target bucket; must be one of the configured allowed buckets (default `general`)
    bucket: Option<String>,
}

/// Stage the parts of `field`, then push the accepted ones to the remote store.
///
/// Fails with the first part's rejection when no part was accepted.
async fn stage_and_store(
    state: &AppState,
    multipart: &mut Multipart,
    field: &str,
    max_files: usize,
    bucket: &Bucket,
) -> Result<(Vec<UploadedImage>, Vec<RejectedPart>), HttpAppError> {
    let mut batch = state
        .upload
        .intake
        .collect(multipart, field, max_files)
        .await?;

    if batch.tasks.is_empty() {
        let err = match batch.rejected.into_iter().next() {
            Some(rejection) => rejection.error.into(),
            None => AppError::InvalidInput(format!("No files provided in field '{}'", field)),
        };
        return Err(err.into());
    }

    let rejected = batch.rejected_parts();
    let tasks = std::mem::take(&mut batch.tasks);
    let images = state.upload.orchestrator.run(bucket, tasks).await?;

    Ok((images, rejected))
}

/// Upload a single image
///
/// Stores one image from the `image` field in the bucket named by the
/// `bucket` query parameter.
#[utoipa::path(
    post,
    path = "/api/v0/uploads",
    tag = "uploads",
    params(BucketQuery),
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Image stored", body = UploadResponse),
        (status = 400, description = "Invalid input or too many files", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 415, description = "Not an image", body = ErrorResponse),
        (status = 500, description = "Remote store failure", body = ErrorResponse),
        (status = 503, description = "Remote store unreachable", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, multipart), fields(bucket = ?query.bucket, operation = "upload_single"))]
pub async fn upload_single(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BucketQuery>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, HttpAppError> {
    let bucket = match query.bucket.as_deref() {
        Some(raw) => Bucket::new(raw)?,
        None => Bucket::general(),
    };
    if !state.config.is_bucket_allowed(&bucket) {
        return Err(AppError::InvalidInput(format!("Bucket '{}' is not allowed", bucket)).into());
    }

    let (images, _) = stage_and_store(
        &state,
        &mut multipart,
        SINGLE_UPLOAD_FIELD,
        state.config.max_files_single(),
        &bucket,
    )
    .await?;

    let image = images
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Internal("Upload produced no image".to_string()))?;

    Ok(Json(UploadResponse::from(image)))
}

/// Upload brand images
///
/// Up to `MAX_FILES_BRANDS` files in the `images` field, stored in the
/// `brands` bucket. The first accepted file is the main image.
#[utoipa::path(
    post,
    path = "/api/v0/uploads/brands",
    tag = "uploads",
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Images stored in submission order", body = BatchUploadResponse),
        (status = 400, description = "Invalid input or too many files", body = ErrorResponse),
        (status = 413, description = "Every file was too large", body = ErrorResponse),
        (status = 415, description = "No file was an image", body = ErrorResponse),
        (status = 500, description = "At least one transfer failed; nothing was stored", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, multipart), fields(operation = "upload_brand_images"))]
pub async fn upload_brand_images(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<BatchUploadResponse>, HttpAppError> {
    let (images, rejected) = stage_and_store(
        &state,
        &mut multipart,
        BATCH_UPLOAD_FIELD,
        state.config.max_files_brands(),
        &Bucket::brands(),
    )
    .await?;

    Ok(Json(BatchUploadResponse { images, rejected }))
}

/// Upload a vehicle photo set
///
/// Up to `MAX_FILES_VEHICLES` files in the `images` field, stored in the
/// `vehicles` bucket. The first accepted file is the main image.
#[utoipa::path(
    post,
    path = "/api/v0/uploads/vehicles",
    tag = "uploads",
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Images stored in submission order", body = BatchUploadResponse),
        (status = 400, description = "Invalid input or too many files", body = ErrorResponse),
        (status = 413, description = "Every file was too large", body = ErrorResponse),
        (status = 415, description = "No file was an image", body = ErrorResponse),
        (status = 500, description = "At least one transfer failed; nothing was stored", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, multipart), fields(operation = "upload_vehicle_images"))]
pub async fn upload_vehicle_images(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<BatchUploadResponse>, HttpAppError> {
    let (images, rejected) = stage_and_store(
        &state,
        &mut multipart,
        BATCH_UPLOAD_FIELD,
        state.config.max_files_vehicles(),
        &Bucket::vehicles(),
    )
    .await?;

    Ok(Json(BatchUploadResponse { images, rejected }))
}
