//! Common utilities for file upload handlers

use motorlot_core::AppError;

/// Normalize MIME type by stripping parameters (e.g. "image/jpeg; charset=utf-8" -> "image/jpeg").
pub fn normalize_mime_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .map(|s| s.trim())
        .unwrap_or(content_type)
        .to_lowercase()
}

/// Whether a (normalized) MIME type is an image type
pub fn is_image_mime(mime: &str) -> bool {
    mime.strip_prefix("image/")
        .map(|subtype| !subtype.is_empty())
        .unwrap_or(false)
}

/// Extension for common image MIME types, used when the file name carries none.
pub fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => ".jpg",
        "image/png" => ".png",
        "image/gif" => ".gif",
        "image/webp" => ".webp",
        "image/avif" => ".avif",
        "image/heic" => ".heic",
        "image/bmp" => ".bmp",
        "image/tiff" => ".tiff",
        _ => "",
    }
}

/// Sanitize filename to prevent path traversal and invalid characters.
/// Returns an error if the filename contains path traversal attempts.
pub fn sanitize_filename(filename: &str) -> Result<String, AppError> {
    const MAX_FILENAME_LENGTH: usize = 255;

    if filename.contains('/') || filename.contains('\\') {
        return Err(AppError::InvalidInput(
            "Filename must not contain path separators".to_string(),
        ));
    }

    if filename.contains("..") {
        return Err(AppError::InvalidInput(
            "Filename contains invalid path traversal".to_string(),
        ));
    }

    let sanitized: String = filename
        .chars()
        .take(MAX_FILENAME_LENGTH)
        .map(|c| {
            if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.trim_matches(|c| c == '.' || c == '_').is_empty() {
        return Err(AppError::InvalidInput("Filename is empty".to_string()));
    }

    Ok(sanitized)
}
