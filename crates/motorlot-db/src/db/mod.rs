//! Database repositories for data access layer
//
// Listing image records (url/key pairs written by the upload pipeline)
pub mod listing_images;
//
// Connection pool and migrations
pub mod pool;

pub use listing_images::{ImageRecordRepository, ImageRecordStore, StoredImage};
pub use pool::setup_database;
