//! Upload pipeline: local intake, staged task types and the batch orchestrator.

pub mod intake;
pub mod orchestrator;
pub mod types;

pub use intake::{IntakeBatch, IntakeRejection, IntakeStage, PartMeta, Rejection};
pub use orchestrator::{BatchFailure, BatchUploadOrchestrator};
pub use types::{TempUpload, UploadTask};
