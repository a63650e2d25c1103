//! Remote store setup and initialization

use anyhow::Result;
use motorlot_core::Config;
use motorlot_storage::{create_connector, RemoteConnector};
use std::sync::Arc;

/// Build the connector for the configured remote backend.
pub async fn setup_remote(config: &Config) -> Result<Arc<dyn RemoteConnector>> {
    tracing::info!("Initializing remote store connector...");
    let connector = create_connector(config).await?;
    tracing::info!(
        backend = %connector.backend_type(),
        uploads_root = %config.remote_uploads_root(),
        "Remote store connector initialized"
    );
    Ok(connector)
}
