mod helpers;

use axum::http::StatusCode;
use axum_test::multipart::MultipartForm;
use helpers::fixtures::{create_minimal_png, image_part, jpeg_part};
use helpers::{
    api_path, setup_test_app, setup_test_app_with, setup_unreachable_app, test_config,
    PUBLIC_BASE,
};
use motorlot_core::UrlNormalizer;
use serde_json::Value;

const KB: usize = 1024;
const MB: usize = 1024 * 1024;

fn is_token(id: &str) -> bool {
    id.len() == 32 && id.chars().all(|c| c.is_ascii_hexdigit())
}

#[tokio::test]
async fn test_upload_single_image() {
    let app = setup_test_app().await;

    let form = MultipartForm::new().add_part(
        "image",
        image_part(create_minimal_png(), "front.png", "image/png"),
    );
    let response = app
        .client()
        .post(&api_path("/uploads"))
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    let key = body["key"].as_str().unwrap();
    let public_id = body["publicId"].as_str().unwrap();

    assert!(key.starts_with("general/"));
    assert!(key.ends_with(".png"));
    assert!(is_token(public_id));
    assert_eq!(
        body["url"].as_str().unwrap(),
        format!("{}/{}", PUBLIC_BASE, key)
    );
    assert_eq!(app.stored_objects("general"), 1);
    assert_eq!(app.staged_files(), 0);
}

#[tokio::test]
async fn test_upload_single_into_allowed_bucket() {
    let app = setup_test_app().await;

    let form = MultipartForm::new().add_part("image", jpeg_part(10 * KB, "photo.jpg"));
    let response = app
        .client()
        .post(&api_path("/uploads"))
        .add_query_param("bucket", "test")
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert!(body["key"].as_str().unwrap().starts_with("test/"));
    assert_eq!(app.stored_objects("test"), 1);
}

#[tokio::test]
async fn test_upload_single_rejects_unknown_bucket() {
    let app = setup_test_app().await;

    let form = MultipartForm::new().add_part("image", jpeg_part(KB, "photo.jpg"));
    let response = app
        .client()
        .post(&api_path("/uploads"))
        .add_query_param("bucket", "secrets")
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "INVALID_INPUT");
    assert_eq!(app.staged_files(), 0);
}

#[tokio::test]
async fn test_upload_non_image_is_unsupported() {
    let app = setup_test_app().await;

    let form = MultipartForm::new().add_part(
        "image",
        image_part(b"not an image".to_vec(), "notes.txt", "text/plain"),
    );
    let response = app
        .client()
        .post(&api_path("/uploads"))
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let body: Value = response.json();
    assert_eq!(body["code"], "UNSUPPORTED_MEDIA_TYPE");
    assert_eq!(app.stored_objects("general"), 0);
    assert_eq!(app.staged_files(), 0);
}

#[tokio::test]
async fn test_upload_single_oversized_file() {
    let app = setup_test_app().await;

    let form = MultipartForm::new().add_part("image", jpeg_part(6 * MB, "huge.jpg"));
    let response = app
        .client()
        .post(&api_path("/uploads"))
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(app.stored_objects("general"), 0);
    assert_eq!(app.staged_files(), 0);
}

#[tokio::test]
async fn test_upload_missing_field() {
    let app = setup_test_app().await;

    let form = MultipartForm::new().add_part("file", jpeg_part(KB, "photo.jpg"));
    let response = app
        .client()
        .post(&api_path("/uploads"))
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(app.staged_files(), 0);
}

#[tokio::test]
async fn test_vehicle_batch_keeps_submission_order() {
    let app = setup_test_app().await;

    let mut form = MultipartForm::new();
    for i in 0..5 {
        form = form.add_part("images", jpeg_part((i + 1) * 20 * KB, &format!("car-{}.jpg", i)));
    }
    let response = app
        .client()
        .post(&api_path("/uploads/vehicles"))
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    let images = body["images"].as_array().unwrap();
    assert_eq!(images.len(), 5);

    for (i, image) in images.iter().enumerate() {
        assert_eq!(image["order"], i);
        assert_eq!(image["isMain"], i == 0);
        assert!(image["key"].as_str().unwrap().starts_with("vehicles/"));
    }
    assert!(body.get("rejected").is_none());
    assert_eq!(app.stored_objects("vehicles"), 5);
    assert_eq!(app.staged_files(), 0);
}

#[tokio::test]
async fn test_vehicle_batch_skips_oversized_part() {
    let app = setup_test_app().await;

    let form = MultipartForm::new()
        .add_part("images", jpeg_part(100 * KB, "small.jpg"))
        .add_part("images", jpeg_part(2 * MB, "medium.jpg"))
        .add_part("images", jpeg_part(6 * MB, "huge.jpg"));
    let response = app
        .client()
        .post(&api_path("/uploads/vehicles"))
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    let images = body["images"].as_array().unwrap();
    assert_eq!(images.len(), 2);
    assert_eq!(images[0]["isMain"], true);
    assert_eq!(images[1]["isMain"], false);

    let rejected = body["rejected"].as_array().unwrap();
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0]["fieldIndex"], 2);
    assert_eq!(rejected[0]["filename"], "huge.jpg");

    assert_eq!(app.stored_objects("vehicles"), 2);
    assert_eq!(app.staged_files(), 0);
}

#[tokio::test]
async fn test_full_brand_batch_with_oversized_part_is_not_refused_whole() {
    let app = setup_test_app_with(&[("MAX_FILE_SIZE_MB", "1"), ("MAX_FILES_BRANDS", "2")]).await;

    let form = MultipartForm::new()
        .add_part("images", jpeg_part(MB, "logo.jpg"))
        .add_part("images", jpeg_part(MB + MB / 2, "banner.jpg"));
    let response = app
        .client()
        .post(&api_path("/uploads/brands"))
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["images"].as_array().unwrap().len(), 1);
    assert_eq!(body["images"][0]["isMain"], true);
    assert_eq!(body["rejected"][0]["fieldIndex"], 1);
    assert_eq!(app.stored_objects("brands"), 1);
    assert_eq!(app.staged_files(), 0);
}

#[tokio::test]
async fn test_brand_batch_too_many_files() {
    let app = setup_test_app().await;

    let mut form = MultipartForm::new();
    for i in 0..11 {
        form = form.add_part("images", jpeg_part(KB, &format!("logo-{}.jpg", i)));
    }
    let response = app
        .client()
        .post(&api_path("/uploads/brands"))
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "TOO_MANY_FILES");
    assert_eq!(app.stored_objects("brands"), 0);
    assert_eq!(app.staged_files(), 0);
}

#[tokio::test]
async fn test_brand_batch_without_images_is_unsupported() {
    let app = setup_test_app().await;

    let form = MultipartForm::new()
        .add_part("images", image_part(b"%PDF-1.4".to_vec(), "a.pdf", "application/pdf"))
        .add_part("images", image_part(b"hello".to_vec(), "b.txt", "text/plain"));
    let response = app
        .client()
        .post(&api_path("/uploads/brands"))
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(app.staged_files(), 0);
}

#[tokio::test]
async fn test_uploaded_url_round_trip_and_delete() {
    let app = setup_test_app().await;

    let form = MultipartForm::new().add_part(
        "images",
        image_part(create_minimal_png(), "logo.png", "image/png"),
    );
    let response = app
        .client()
        .post(&api_path("/uploads/brands"))
        .multipart(form)
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let body: Value = response.json();
    let url = body["images"][0]["url"].as_str().unwrap().to_string();
    let key = body["images"][0]["key"].as_str().unwrap().to_string();

    let config = test_config(app.temp_dir.path(), &[]);
    let normalizer = UrlNormalizer::from_config(&config).unwrap();
    assert!(normalizer.is_valid(&url));
    assert_eq!(normalizer.repair(&url, Some("Logo")), url);

    let response = app
        .client()
        .delete(&api_path(&format!("/uploads/{}", key)))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["deleted"], true);
    assert_eq!(app.stored_objects("brands"), 0);

    let response = app
        .client()
        .delete(&api_path(&format!("/uploads/{}", key)))
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_local_upload() {
    let app = setup_test_app().await;
    std::fs::write(app.local_uploads_dir().join("legacy.png"), create_minimal_png()).unwrap();

    let response = app
        .client()
        .delete(&api_path("/uploads/legacy.png"))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert!(!app.local_uploads_dir().join("legacy.png").exists());

    let response = app
        .client()
        .delete(&api_path("/uploads/legacy.png"))
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_single_upload_remote_unreachable() {
    let app = setup_unreachable_app().await;

    let form = MultipartForm::new().add_part("image", jpeg_part(KB, "photo.jpg"));
    let response = app
        .client()
        .post(&api_path("/uploads"))
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json();
    assert_eq!(body["code"], "REMOTE_CONNECT_ERROR");
    assert!(body.get("details").is_none());
    assert_eq!(app.staged_files(), 0);
}

#[tokio::test]
async fn test_batch_upload_remote_unreachable() {
    let app = setup_unreachable_app().await;

    let form = MultipartForm::new()
        .add_part("images", jpeg_part(KB, "a.jpg"))
        .add_part("images", jpeg_part(KB, "b.jpg"))
        .add_part("images", jpeg_part(KB, "c.jpg"));
    let response = app
        .client()
        .post(&api_path("/uploads/vehicles"))
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["code"], "UPLOAD_BATCH_FAILED");
    assert_eq!(app.staged_files(), 0);
}

#[tokio::test]
async fn test_health_reports_remote_state() {
    let app = setup_test_app().await;
    let response = app.client().get("/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");

    let app = setup_unreachable_app().await;
    let response = app.client().get("/health").await;
    assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json();
    assert_eq!(body["status"], "degraded");
}

#[tokio::test]
async fn test_openapi_document_served() {
    let app = setup_test_app().await;

    let response = app.client().get(&api_path("/openapi.json")).await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert!(body["paths"].get("/api/v0/uploads/vehicles").is_some());
}
