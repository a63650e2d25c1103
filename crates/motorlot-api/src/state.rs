//! Application state shared by every handler.

use crate::services::upload::{BatchUploadOrchestrator, IntakeStage};
use motorlot_core::{Config, UrlNormalizer};
use std::path::PathBuf;
use std::sync::Arc;

/// Upload pipeline collaborators, constructed once at startup
#[derive(Clone)]
pub struct UploadState {
    pub intake: IntakeStage,
    pub orchestrator: BatchUploadOrchestrator,
    pub normalizer: Arc<UrlNormalizer>,
    /// Directory holding artifacts that never went to the remote store.
    pub local_uploads_dir: PathBuf,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub upload: UploadState,
}
