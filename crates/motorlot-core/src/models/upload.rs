use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::Bucket;

/// Result of one successful remote transfer.
///
/// A value of this type is only produced once the object is stored at
/// `remote_key`; rolling the object back means deleting that key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    pub bucket: Bucket,
    /// `bucket/<token><ext>`
    pub remote_key: String,
    pub public_url: String,
    /// Random token embedded in the remote filename.
    pub unique_id: String,
    /// Size reported by the remote store after the transfer.
    pub byte_size: u64,
}

/// Response for the single-file upload route
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub url: String,
    pub key: String,
    pub public_id: String,
}

impl From<UploadedImage> for UploadResponse {
    fn from(image: UploadedImage) -> Self {
        UploadResponse {
            url: image.url,
            key: image.key,
            public_id: image.public_id,
        }
    }
}

/// One stored image of a batch, in submission order
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadedImage {
    pub url: String,
    pub key: String,
    pub public_id: String,
    pub is_main: bool,
    /// Zero-based index of the part in the multipart field
    pub order: usize,
}

impl UploadedImage {
    pub fn from_outcome(outcome: TransferOutcome, order: usize, is_main: bool) -> Self {
        UploadedImage {
            url: outcome.public_url,
            key: outcome.remote_key,
            public_id: outcome.unique_id,
            is_main,
            order,
        }
    }
}

/// A multipart part that was refused at intake
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RejectedPart {
    pub field_index: usize,
    pub filename: Option<String>,
    pub reason: String,
}

/// Response for the batch upload routes
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BatchUploadResponse {
    pub images: Vec<UploadedImage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<RejectedPart>,
}
