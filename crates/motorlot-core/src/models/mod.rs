//! Data models for the upload pipeline
//!
//! Bucket names, transfer results and the response shapes returned to
//! callers of the upload routes.

mod bucket;
mod upload;

pub use bucket::*;
pub use upload::*;
