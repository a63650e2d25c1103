//! Motorlot Core Library
//!
//! This crate provides configuration, the error taxonomy, shared upload models
//! and the key/URL normalizer used by every motorlot component.

pub mod config;
pub mod error;
pub mod models;
pub mod storage_types;
pub mod url_normalizer;

// Re-export commonly used types
pub use config::{BaseConfig, Config, PipelineConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{Bucket, TransferOutcome, UploadedImage};
pub use storage_types::{IntegrityPolicy, RemoteBackend};
pub use url_normalizer::{check_remote_key, InvalidReason, UrlNormalizer, UrlVerdict};
