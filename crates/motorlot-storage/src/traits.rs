//! Remote session abstraction
//!
//! A `RemoteConnector` opens stateful sessions against the remote file store;
//! a `RemoteSession` performs single protocol operations on paths relative to
//! the session's working directory.

use crate::RemoteBackend;
use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Errors from a single remote protocol operation
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Remote path not found: {0}")]
    NotFound(String),

    #[error("Remote path already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid remote path: {0}")]
    InvalidPath(String),

    #[error("Remote protocol error: {0}")]
    Protocol(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// One open session with the remote file store.
///
/// Sessions are not shared between transfers; the transfer client opens one,
/// runs its operations and closes it on every exit path.
#[async_trait]
pub trait RemoteSession: Send + Sync {
    async fn exists(&self, path: &str) -> SessionResult<bool>;

    /// Create a single directory. Fails with `AlreadyExists` when it is already there.
    async fn create_dir(&self, path: &str, mode: u32) -> SessionResult<()>;

    /// Stream the local file to `remote`, returning the number of bytes written.
    async fn upload(&self, local: &Path, remote: &str) -> SessionResult<u64>;

    /// Size of the remote object as reported by the store.
    async fn size(&self, path: &str) -> SessionResult<u64>;

    async fn set_permissions(&self, path: &str, mode: u32) -> SessionResult<()>;

    /// Remove a single object. Fails with `NotFound` when there is nothing to remove.
    async fn remove(&self, path: &str) -> SessionResult<()>;

    /// Release the session. Called exactly once per opened session.
    async fn close(&mut self) -> SessionResult<()>;
}

/// Factory for remote sessions
#[async_trait]
pub trait RemoteConnector: Send + Sync {
    async fn connect(&self) -> SessionResult<Box<dyn RemoteSession>>;

    /// Get the remote backend type
    fn backend_type(&self) -> RemoteBackend;
}
