#[cfg(feature = "remote-local")]
use crate::LocalConnector;
#[cfg(feature = "remote-sftp")]
use crate::{HostKeyPolicy, SftpConnector};
use crate::{RemoteBackend, RemoteConnector, RemoteTransferClient, RetryPolicy};
use crate::{SessionError, SessionResult};
use motorlot_core::{Config, UrlNormalizer};
use std::sync::Arc;
use std::time::Duration;

/// Create a remote connector based on configuration
pub async fn create_connector(config: &Config) -> SessionResult<Arc<dyn RemoteConnector>> {
    match config.remote_backend() {
        #[cfg(feature = "remote-sftp")]
        RemoteBackend::Sftp => {
            let host = config
                .remote_host()
                .map(String::from)
                .ok_or_else(|| SessionError::Config("REMOTE_HOST not configured".to_string()))?;
            let username = config
                .remote_username()
                .map(String::from)
                .ok_or_else(|| {
                    SessionError::Config("REMOTE_USERNAME not configured".to_string())
                })?;
            let password = config
                .remote_password()
                .map(String::from)
                .ok_or_else(|| {
                    SessionError::Config("REMOTE_PASSWORD not configured".to_string())
                })?;

            let connector = SftpConnector::new(
                host,
                config.remote_port(),
                username,
                password,
                host_key_policy(config)?,
            );
            Ok(Arc::new(connector))
        }

        #[cfg(not(feature = "remote-sftp"))]
        RemoteBackend::Sftp => Err(SessionError::Config(
            "SFTP remote backend not available (remote-sftp feature not enabled)".to_string(),
        )),

        #[cfg(feature = "remote-local")]
        RemoteBackend::Local => {
            let root = config.remote_local_root().map(String::from).ok_or_else(|| {
                SessionError::Config("REMOTE_LOCAL_ROOT not configured".to_string())
            })?;

            let connector = LocalConnector::new(root).await?;
            Ok(Arc::new(connector))
        }

        #[cfg(not(feature = "remote-local"))]
        RemoteBackend::Local => Err(SessionError::Config(
            "Local remote backend not available (remote-local feature not enabled)".to_string(),
        )),
    }
}

/// Host key verification for the SFTP backend
///
/// A pinned fingerprint wins over a known_hosts file. Accepting any key has to
/// be opted into.
#[cfg(feature = "remote-sftp")]
pub fn host_key_policy(config: &Config) -> SessionResult<HostKeyPolicy> {
    if let Some(fingerprint) = config.remote_host_key() {
        return Ok(HostKeyPolicy::Fingerprint(fingerprint.to_string()));
    }
    if let Some(path) = config.remote_known_hosts() {
        return Ok(HostKeyPolicy::KnownHosts(path.into()));
    }
    if config.remote_accept_unknown_host_key() {
        return Ok(HostKeyPolicy::AcceptAny);
    }
    Err(SessionError::Config(
        "REMOTE_HOST_KEY or REMOTE_KNOWN_HOSTS not configured".to_string(),
    ))
}

/// Build the transfer client with retry and integrity settings from configuration
pub async fn create_transfer_client(
    config: &Config,
    normalizer: Arc<UrlNormalizer>,
) -> SessionResult<RemoteTransferClient> {
    let connector = create_connector(config).await?;
    Ok(transfer_client_for(config, connector, normalizer))
}

/// Wrap an already constructed connector with the configured retry and integrity settings
pub fn transfer_client_for(
    config: &Config,
    connector: Arc<dyn RemoteConnector>,
    normalizer: Arc<UrlNormalizer>,
) -> RemoteTransferClient {
    let retry = RetryPolicy {
        retries: config.remote_connect_retries(),
        initial_backoff: Duration::from_millis(config.remote_retry_backoff_ms()),
        connect_timeout: Duration::from_secs(config.remote_connect_timeout_secs()),
    };

    RemoteTransferClient::new(connector, config.remote_uploads_root(), normalizer)
        .with_retry(retry)
        .with_integrity_policy(config.integrity_policy())
}
