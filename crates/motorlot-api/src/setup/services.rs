//! Service initialization and application state setup

use crate::services::upload::{BatchUploadOrchestrator, IntakeStage};
use crate::state::{AppState, UploadState};
use anyhow::{Context, Result};
use motorlot_core::{Config, UrlNormalizer};
use motorlot_storage::{transfer_client_for, RemoteConnector};
use std::path::PathBuf;
use std::sync::Arc;

/// Initialize the upload pipeline around `connector`, returning the application state
pub async fn initialize_services(
    config: &Config,
    connector: Arc<dyn RemoteConnector>,
) -> Result<Arc<AppState>> {
    let normalizer = Arc::new(
        UrlNormalizer::from_config(config).context("Failed to build URL normalizer")?,
    );

    let intake = IntakeStage::new(config.upload_temp_dir(), config.max_file_size_bytes())
        .await
        .with_context(|| {
            format!(
                "Failed to create upload temp directory {}",
                config.upload_temp_dir()
            )
        })?;

    let client = transfer_client_for(config, connector, normalizer.clone());
    let orchestrator = BatchUploadOrchestrator::new(
        client,
        config.max_concurrent_transfers(),
        config.rollback_on_batch_failure(),
    );

    tracing::info!(
        temp_dir = %intake.temp_dir().display(),
        max_concurrent_transfers = config.max_concurrent_transfers(),
        rollback_on_batch_failure = config.rollback_on_batch_failure(),
        integrity_policy = ?config.integrity_policy(),
        public_base = %normalizer.public_base(),
        "Upload pipeline initialized"
    );

    Ok(Arc::new(AppState {
        config: config.clone(),
        upload: UploadState {
            intake,
            orchestrator,
            normalizer,
            local_uploads_dir: PathBuf::from(config.local_uploads_dir()),
        },
    }))
}
