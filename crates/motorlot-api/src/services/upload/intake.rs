//! Local Intake Stage
//!
//! Validates multipart parts and stages accepted ones in a process-wide
//! temporary directory. Nothing here talks to the remote store.

use super::types::{TempUpload, UploadTask};
use crate::utils::upload::{extension_for_mime, is_image_mime, normalize_mime_type};
use axum::extract::multipart::{Multipart, MultipartError};
use axum::http::StatusCode;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use motorlot_core::models::RejectedPart;
use motorlot_core::AppError;
use motorlot_storage::keys::{extension_of, generate_token};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Error)]
pub enum IntakeRejection {
    #[error("Unsupported media type '{content_type}': only image files are accepted")]
    UnsupportedMediaType { content_type: String },

    #[error("File exceeds the maximum size of {limit_bytes} bytes")]
    PayloadTooLarge { limit_bytes: usize },

    #[error("File is empty")]
    EmptyFile,

    #[error("Malformed multipart body: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Failed to stage upload: {0}")]
    Io(#[from] std::io::Error),
}

impl IntakeRejection {
    /// Rejections that refuse a single part while the rest of the request proceeds
    pub fn is_part_level(&self) -> bool {
        matches!(
            self,
            IntakeRejection::UnsupportedMediaType { .. }
                | IntakeRejection::PayloadTooLarge { .. }
                | IntakeRejection::EmptyFile
        )
    }
}

impl From<IntakeRejection> for AppError {
    fn from(err: IntakeRejection) -> Self {
        match err {
            IntakeRejection::UnsupportedMediaType { .. } => {
                AppError::UnsupportedMediaType(err.to_string())
            }
            IntakeRejection::PayloadTooLarge { .. } => AppError::PayloadTooLarge(err.to_string()),
            IntakeRejection::EmptyFile => AppError::InvalidInput(err.to_string()),
            IntakeRejection::Multipart(ref e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                AppError::PayloadTooLarge(e.body_text())
            }
            IntakeRejection::Multipart(e) => {
                AppError::InvalidInput(format!("Failed to read multipart: {}", e.body_text()))
            }
            IntakeRejection::Io(e) => AppError::InternalWithSource {
                message: "Failed to stage upload".to_string(),
                source: e.into(),
            },
        }
    }
}

/// Client-supplied metadata of one multipart part
#[derive(Debug, Clone)]
pub struct PartMeta {
    pub field_index: usize,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
}

#[derive(Debug)]
pub struct Rejection {
    pub part: RejectedPart,
    pub error: IntakeRejection,
}

/// Everything staged from one multipart field
#[derive(Debug, Default)]
pub struct IntakeBatch {
    pub tasks: Vec<UploadTask>,
    pub rejected: Vec<Rejection>,
}

impl IntakeBatch {
    pub fn rejected_parts(&self) -> Vec<RejectedPart> {
        self.rejected.iter().map(|r| r.part.clone()).collect()
    }

    /// Delete every staged file of this batch.
    pub async fn discard(&mut self) {
        for task in self.tasks.drain(..) {
            task.discard().await;
        }
    }
}

#[derive(Debug, Clone)]
pub struct IntakeStage {
    temp_dir: PathBuf,
    max_file_size: usize,
}

impl IntakeStage {
    /// Create the stage, creating `temp_dir` if needed
    ///
    /// The directory lives for the whole process; only the files inside it
    /// are removed, by whoever owns the corresponding [`UploadTask`].
    pub async fn new(temp_dir: impl Into<PathBuf>, max_file_size: usize) -> std::io::Result<Self> {
        let temp_dir = temp_dir.into();
        tokio::fs::create_dir_all(&temp_dir).await?;

        tracing::debug!(
            temp_dir = %temp_dir.display(),
            max_file_size = max_file_size,
            "Upload intake directory ready"
        );

        Ok(Self {
            temp_dir,
            max_file_size,
        })
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    pub fn max_file_size(&self) -> usize {
        self.max_file_size
    }

    /// Validate one part and stage its bytes under a random file name.
    ///
    /// The MIME type is checked before anything touches the disk. A part that
    /// turns out to be too large or empty leaves no file behind.
    pub async fn accept<S, E>(&self, meta: &PartMeta, stream: S) -> Result<UploadTask, IntakeRejection>
    where
        S: Stream<Item = Result<Bytes, E>>,
        IntakeRejection: From<E>,
    {
        let mime = meta
            .content_type
            .as_deref()
            .map(normalize_mime_type)
            .unwrap_or_default();
        if !is_image_mime(&mime) {
            return Err(IntakeRejection::UnsupportedMediaType {
                content_type: meta
                    .content_type
                    .clone()
                    .unwrap_or_else(|| "unknown".to_string()),
            });
        }

        let mut extension = meta
            .file_name
            .as_deref()
            .map(extension_of)
            .unwrap_or_default();
        if extension.is_empty() {
            extension = extension_for_mime(&mime).to_string();
        }

        let staged = TempUpload::new(
            self.temp_dir
                .join(format!("{}{}", generate_token(), extension)),
        );

        match self.write_part(staged.path(), stream).await {
            Ok(0) => {
                staged.discard().await;
                Err(IntakeRejection::EmptyFile)
            }
            Ok(size) => Ok(UploadTask::new(
                staged,
                meta.file_name.clone(),
                mime,
                size,
                meta.field_index,
            )),
            Err(e) => {
                staged.discard().await;
                Err(e)
            }
        }
    }

    async fn write_part<S, E>(&self, path: &Path, stream: S) -> Result<u64, IntakeRejection>
    where
        S: Stream<Item = Result<Bytes, E>>,
        IntakeRejection: From<E>,
    {
        let mut stream = std::pin::pin!(stream);
        let mut file = tokio::fs::File::create(path).await?;
        let mut written: usize = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            written += chunk.len();
            if written > self.max_file_size {
                return Err(IntakeRejection::PayloadTooLarge {
                    limit_bytes: self.max_file_size,
                });
            }
            file.write_all(&chunk).await?;
        }

        file.flush().await?;
        Ok(written as u64)
    }

    /// Stage every part of `field_name`, in order.
    ///
    /// Parts refused for their own content are reported in
    /// [`IntakeBatch::rejected`]; more than `max_files` parts, a broken body or
    /// a local I/O failure abort the request and remove what was staged.
    #[tracing::instrument(skip(self, multipart), fields(field = %field_name, max_files = max_files))]
    pub async fn collect(
        &self,
        multipart: &mut Multipart,
        field_name: &str,
        max_files: usize,
    ) -> Result<IntakeBatch, AppError> {
        let mut batch = IntakeBatch::default();
        let mut field_index = 0;

        loop {
            let field = match multipart.next_field().await {
                Ok(Some(field)) => field,
                Ok(None) => break,
                Err(e) => {
                    batch.discard().await;
                    return Err(IntakeRejection::from(e).into());
                }
            };

            if field.name() != Some(field_name) {
                tracing::debug!(field = ?field.name(), "Ignoring unexpected multipart field");
                continue;
            }

            if field_index >= max_files {
                batch.discard().await;
                return Err(AppError::TooManyFiles { limit: max_files });
            }

            let meta = PartMeta {
                field_index,
                file_name: field.file_name().map(String::from),
                content_type: field.content_type().map(String::from),
            };
            field_index += 1;

            match self.accept(&meta, field).await {
                Ok(task) => batch.tasks.push(task),
                Err(rejection) if rejection.is_part_level() => {
                    tracing::debug!(
                        field_index = meta.field_index,
                        filename = ?meta.file_name,
                        reason = %rejection,
                        "Upload part rejected"
                    );
                    batch.rejected.push(Rejection {
                        part: RejectedPart {
                            field_index: meta.field_index,
                            filename: meta.file_name,
                            reason: rejection.to_string(),
                        },
                        error: rejection,
                    });
                }
                Err(rejection) => {
                    batch.discard().await;
                    return Err(rejection.into());
                }
            }
        }

        Ok(batch)
    }
}
