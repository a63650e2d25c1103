//! Route configuration and setup.
//!
//! Upload routes get their own body limit sized from the per-route file
//! count; health checks live in [health](health).

mod health;

use crate::api_doc::openapi_json;
use crate::constants::{api_path, MULTIPART_OVERHEAD_BYTES};
use crate::handlers::{delete, upload};
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{delete as delete_route, get, post},
    Router,
};
use motorlot_core::Config;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router<()>, anyhow::Error> {
    let cors = setup_cors(config)?;

    let app = Router::new()
        .route("/health", get(health::health_check))
        .route(&api_path("/openapi.json"), get(openapi_json))
        .merge(upload_routes(config))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(app)
}

/// Body limit for a multipart request carrying up to `max_files` files
///
/// One extra file's worth of room lets a full request carry an oversized part
/// that intake rejects on its own. Past that the whole request gets a 413.
fn body_limit(config: &Config, max_files: usize) -> usize {
    config
        .max_file_size_bytes()
        .saturating_mul(max_files.saturating_add(1))
        .saturating_add(MULTIPART_OVERHEAD_BYTES)
}

fn upload_routes(config: &Config) -> Router<Arc<AppState>> {
    let single_limit = body_limit(config, config.max_files_single());
    let brands_limit = body_limit(config, config.max_files_brands());
    let vehicles_limit = body_limit(config, config.max_files_vehicles());

    tracing::debug!(
        single_limit,
        brands_limit,
        vehicles_limit,
        "Upload body limits configured"
    );

    Router::new()
        .route(
            &api_path("/uploads"),
            post(upload::upload_single).layer(DefaultBodyLimit::max(single_limit)),
        )
        .route(
            &api_path("/uploads/brands"),
            post(upload::upload_brand_images).layer(DefaultBodyLimit::max(brands_limit)),
        )
        .route(
            &api_path("/uploads/vehicles"),
            post(upload::upload_vehicle_images).layer(DefaultBodyLimit::max(vehicles_limit)),
        )
        .route(
            &api_path("/uploads/{*key}"),
            delete_route(delete::delete_upload),
        )
}

fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let cors = if config.cors_origins().iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_origins()
            .iter()
            .map(|o| o.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("Invalid CORS origin: {}", e))?;
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers(Any)
    };
    Ok(cors)
}
