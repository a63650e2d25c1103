//! Motorlot API Library
//!
//! This crate provides the HTTP upload surface: the local intake stage, the
//! batch upload orchestrator, handlers, and application setup.

// Module declarations
mod api_doc;
pub mod constants;
mod handlers;
pub mod services;
pub mod setup;
mod telemetry;
mod utils;

// Public modules
pub mod error;
pub mod state;

// Re-exports
pub use error::{ErrorResponse, HttpAppError};
pub use services::upload::{BatchFailure, BatchUploadOrchestrator, IntakeStage, UploadTask};
