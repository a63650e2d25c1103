//! Types used by the upload pipeline

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// A staged local file that is deleted exactly once
///
/// Call [`TempUpload::discard`] on the normal path. If the owner is dropped
/// without discarding (request aborted, task panicked) the file is removed
/// synchronously in `Drop`.
#[derive(Debug)]
pub struct TempUpload {
    path: PathBuf,
    removed: bool,
}

impl TempUpload {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self {
            path,
            removed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file. Failures are logged, never returned.
    pub async fn discard(mut self) {
        self.removed = true;
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            log_cleanup_failure(&self.path, &e);
        }
    }
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        self.removed = true;
        if let Err(e) = std::fs::remove_file(&self.path) {
            log_cleanup_failure(&self.path, &e);
        }
    }
}

fn log_cleanup_failure(path: &Path, err: &std::io::Error) {
    if err.kind() == ErrorKind::NotFound {
        return;
    }
    tracing::warn!(
        error = %err,
        path = %path.display(),
        "Failed to remove staged upload"
    );
}

/// One accepted multipart part, staged on local disk
#[derive(Debug)]
pub struct UploadTask {
    /// Client-supplied file name; informational only.
    pub original_name: Option<String>,
    pub mime_type: String,
    /// Bytes written to the staged file.
    pub byte_size: u64,
    /// Zero-based index of the part within its multipart field.
    pub submission_order: usize,
    file: TempUpload,
}

impl UploadTask {
    pub(crate) fn new(
        file: TempUpload,
        original_name: Option<String>,
        mime_type: String,
        byte_size: u64,
        submission_order: usize,
    ) -> Self {
        Self {
            original_name,
            mime_type,
            byte_size,
            submission_order,
            file,
        }
    }

    pub fn local_path(&self) -> &Path {
        self.file.path()
    }

    /// Delete the staged file.
    pub async fn discard(self) {
        self.file.discard().await;
    }
}
