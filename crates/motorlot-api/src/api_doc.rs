//! OpenAPI documentation.
//! Served as JSON at `/api/v0/openapi.json`.

use axum::Json;
use utoipa::OpenApi;

use crate::error;
use crate::handlers;
use motorlot_core::models;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Motorlot Upload API",
        version = "0.1.0",
        description = "Image upload pipeline for the vehicle marketplace (v0). Accepts multipart image uploads, stores them in the remote file store and returns canonical public URLs."
    ),
    paths(
        handlers::upload::upload_single,
        handlers::upload::upload_brand_images,
        handlers::upload::upload_vehicle_images,
        handlers::delete::delete_upload,
    ),
    components(
        schemas(
            models::UploadResponse,
            models::UploadedImage,
            models::RejectedPart,
            models::BatchUploadResponse,
            handlers::delete::DeleteResponse,
            error::ErrorResponse,
        )
    ),
    tags(
        (name = "uploads", description = "Image uploads and deletion")
    )
)]
pub struct ApiDoc;

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_upload_routes() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/v0/uploads",
            "/api/v0/uploads/brands",
            "/api/v0/uploads/vehicles",
            "/api/v0/uploads/{key}",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
    }
}
