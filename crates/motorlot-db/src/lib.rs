//! Motorlot persistence layer
//!
//! Only the image-record access needed by the repair sweep lives here; the
//! listing CRUD that owns these rows is a separate system.

pub mod db;

pub use db::{setup_database, ImageRecordRepository, ImageRecordStore, StoredImage};
