//! SFTP backend
//!
//! Each `connect` opens an SSH connection, authenticates with the configured
//! credential pair and starts the `sftp` subsystem on a fresh channel. The
//! server's host key is checked against a [`HostKeyPolicy`] before the
//! password is sent.

use crate::traits::{RemoteConnector, RemoteSession, SessionError, SessionResult};
use crate::RemoteBackend;
use async_trait::async_trait;
use russh::client;
use russh_keys::key::PublicKey;
use russh_sftp::client::SftpSession;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;

const INACTIVITY_TIMEOUT_SECS: u64 = 60;

fn protocol<E: std::fmt::Display>(context: &'static str) -> impl FnOnce(E) -> SessionError {
    move |e| SessionError::Protocol(format!("{}: {}", context, e))
}

/// How the remote host key is verified before any credential is sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostKeyPolicy {
    /// Pinned SHA-256 fingerprint, with or without the `SHA256:` prefix.
    Fingerprint(String),
    /// OpenSSH known_hosts file.
    KnownHosts(PathBuf),
    /// Accept any key. Only used when explicitly configured.
    AcceptAny,
}

impl HostKeyPolicy {
    fn verify(&self, host: &str, port: u16, key: &PublicKey) -> bool {
        let fingerprint = key.fingerprint();
        let accepted = match self {
            HostKeyPolicy::Fingerprint(expected) => fingerprint_matches(expected, &fingerprint),
            HostKeyPolicy::KnownHosts(path) => {
                match russh_keys::check_known_hosts_path(host, port, key, path) {
                    Ok(known) => known,
                    Err(e) => {
                        tracing::error!(
                            host = %host,
                            error = %e,
                            known_hosts = %path.display(),
                            "Remote host key check failed"
                        );
                        false
                    }
                }
            }
            HostKeyPolicy::AcceptAny => {
                tracing::warn!(host = %host, fingerprint = %fingerprint, "Accepting unverified remote host key");
                true
            }
        };

        if !accepted {
            tracing::error!(host = %host, fingerprint = %fingerprint, "Refusing unknown remote host key");
        }
        accepted
    }
}

/// Compare SHA-256 fingerprints, ignoring the `SHA256:` prefix and base64 padding.
pub fn fingerprint_matches(expected: &str, actual: &str) -> bool {
    fn bare(fingerprint: &str) -> &str {
        let fingerprint = fingerprint.trim();
        fingerprint
            .strip_prefix("SHA256:")
            .unwrap_or(fingerprint)
            .trim_end_matches('=')
    }
    let expected = bare(expected);
    !expected.is_empty() && expected == bare(actual)
}

struct SessionHandler {
    host: String,
    port: u16,
    host_keys: Arc<HostKeyPolicy>,
}

#[async_trait]
impl client::Handler for SessionHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(self.host_keys.verify(&self.host, self.port, server_public_key))
    }
}

/// Connector for a remote file store reachable over SFTP
#[derive(Clone)]
pub struct SftpConnector {
    host: String,
    port: u16,
    username: String,
    password: String,
    host_keys: Arc<HostKeyPolicy>,
    config: Arc<client::Config>,
}

impl SftpConnector {
    pub fn new(
        host: String,
        port: u16,
        username: String,
        password: String,
        host_keys: HostKeyPolicy,
    ) -> Self {
        let config = client::Config {
            inactivity_timeout: Some(Duration::from_secs(INACTIVITY_TIMEOUT_SECS)),
            ..Default::default()
        };

        Self {
            host,
            port,
            username,
            password,
            host_keys: Arc::new(host_keys),
            config: Arc::new(config),
        }
    }
}

#[async_trait]
impl RemoteConnector for SftpConnector {
    #[tracing::instrument(skip(self), fields(remote.host = %self.host, remote.port = self.port))]
    async fn connect(&self) -> SessionResult<Box<dyn RemoteSession>> {
        let handler = SessionHandler {
            host: self.host.clone(),
            port: self.port,
            host_keys: self.host_keys.clone(),
        };

        let mut handle = client::connect(
            self.config.clone(),
            (self.host.as_str(), self.port),
            handler,
        )
        .await
        .map_err(protocol("ssh connect"))?;

        let authenticated = handle
            .authenticate_password(self.username.clone(), self.password.clone())
            .await
            .map_err(protocol("ssh authentication"))?;
        if !authenticated {
            return Err(SessionError::Protocol(format!(
                "password authentication rejected for user {}",
                self.username
            )));
        }

        let mut channel = handle
            .channel_open_session()
            .await
            .map_err(protocol("open channel"))?;
        channel
            .request_subsystem(true, "sftp")
            .await
            .map_err(protocol("request sftp subsystem"))?;
        let sftp = SftpSession::new(channel.into_stream())
            .await
            .map_err(protocol("start sftp session"))?;

        Ok(Box::new(SftpRemoteSession { handle, sftp }))
    }

    fn backend_type(&self) -> RemoteBackend {
        RemoteBackend::Sftp
    }
}

struct SftpRemoteSession {
    handle: client::Handle<SessionHandler>,
    sftp: SftpSession,
}

#[async_trait]
impl RemoteSession for SftpRemoteSession {
    async fn exists(&self, path: &str) -> SessionResult<bool> {
        self.sftp
            .try_exists(path)
            .await
            .map_err(protocol("stat"))
    }

    async fn create_dir(&self, path: &str, mode: u32) -> SessionResult<()> {
        if self.exists(path).await? {
            return Err(SessionError::AlreadyExists(path.to_string()));
        }
        self.sftp
            .create_dir(path)
            .await
            .map_err(protocol("mkdir"))?;
        self.set_permissions(path, mode).await
    }

    async fn upload(&self, local: &Path, remote: &str) -> SessionResult<u64> {
        let mut source = fs::File::open(local).await?;
        let mut target = self
            .sftp
            .create(remote)
            .await
            .map_err(protocol("open remote file"))?;

        let written = tokio::io::copy(&mut source, &mut target).await?;
        target.shutdown().await?;
        Ok(written)
    }

    async fn size(&self, path: &str) -> SessionResult<u64> {
        let metadata = self
            .sftp
            .metadata(path)
            .await
            .map_err(protocol("stat"))?;
        metadata
            .size
            .ok_or_else(|| SessionError::Protocol(format!("no size reported for {}", path)))
    }

    async fn set_permissions(&self, path: &str, mode: u32) -> SessionResult<()> {
        let mut attributes = self
            .sftp
            .metadata(path)
            .await
            .map_err(protocol("stat"))?;
        attributes.permissions = Some(mode);
        self.sftp
            .set_metadata(path, attributes)
            .await
            .map_err(protocol("chmod"))
    }

    async fn remove(&self, path: &str) -> SessionResult<()> {
        if !self.exists(path).await? {
            return Err(SessionError::NotFound(path.to_string()));
        }
        self.sftp
            .remove_file(path)
            .await
            .map_err(protocol("remove"))
    }

    async fn close(&mut self) -> SessionResult<()> {
        if let Err(e) = self.sftp.close().await {
            tracing::debug!(error = %e, "SFTP subsystem close failed");
        }
        self.handle
            .disconnect(russh::Disconnect::ByApplication, "", "English")
            .await
            .map_err(protocol("disconnect"))
    }
}
