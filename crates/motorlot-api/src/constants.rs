//! API constants
//!
//! Every route is versioned under `API_PREFIX`.

/// API base path prefix (version-independent)
pub const API_BASE: &str = "/api";

pub const API_VERSION: &str = "v0";

/// Versioned prefix, e.g. `/api/v0`
pub const API_PREFIX: &str = "/api/v0";

/// Multipart field of the single-file route
pub const SINGLE_UPLOAD_FIELD: &str = "image";

/// Multipart field of the batch routes
pub const BATCH_UPLOAD_FIELD: &str = "images";

/// Slack added to per-route body limits for multipart boundaries and headers
pub const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Build a versioned API path, e.g. `api_path("/uploads")` -> `/api/v0/uploads`.
pub fn api_path(path: &str) -> String {
    format!("{}{}", API_PREFIX, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_path() {
        assert_eq!(api_path("/uploads"), "/api/v0/uploads");
        assert!(API_PREFIX.starts_with(API_BASE));
        assert!(API_PREFIX.ends_with(API_VERSION));
    }
}
