//! Shared key generation for remote objects and staged files.
//!
//! Tokens are 16 bytes from the thread-local CSPRNG, hex encoded, so
//! collisions are negligible and no retry-on-collision is needed.

use motorlot_core::Bucket;
use std::path::Path;

const MAX_EXTENSION_LEN: usize = 10;

/// 32 lowercase hex characters drawn from a cryptographically secure source.
pub fn generate_token() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}

/// Sanitized extension of `name` including the leading dot, or an empty string.
///
/// Only short ASCII alphanumeric extensions survive; the result is lowercased.
pub fn extension_of(name: impl AsRef<Path>) -> String {
    name.as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| {
            !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default()
}

/// Generate `(remote_key, token)` for a new object in `bucket`.
///
/// The key is `{bucket}/{token}{extension}`; `extension` should come from
/// [`extension_of`].
pub fn generate_remote_key(bucket: &Bucket, extension: &str) -> (String, String) {
    let token = generate_token();
    (format!("{}/{}{}", bucket, token, extension), token)
}

/// Join the uploads root and a relative path with a single separator.
pub fn remote_path(root: &str, relative: &str) -> String {
    let root = root.trim_end_matches('/');
    if root.is_empty() {
        relative.to_string()
    } else {
        format!("{}/{}", root, relative.trim_start_matches('/'))
    }
}
