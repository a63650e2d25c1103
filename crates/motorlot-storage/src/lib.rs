//! Motorlot Storage Library
//!
//! This crate provides the Remote Transfer Client: a session abstraction over
//! the remote file store plus SFTP and local filesystem implementations.
//!
//! # Remote key format
//!
//! Every stored object lives at `{uploads_root}/{bucket}/{token}{ext}` where
//! `token` is 32 random hex characters. The remote key handed back to callers
//! is the `{bucket}/{token}{ext}` part. Keys must not contain `..`, a leading
//! `/` or more than one separator. Key generation is centralized in the `keys`
//! module.

pub mod client;
pub mod factory;
pub mod keys;
#[cfg(feature = "remote-local")]
pub mod local;
#[cfg(feature = "remote-sftp")]
pub mod sftp;
pub mod traits;

// Re-export commonly used types
pub use client::{RemoteTransferClient, RetryPolicy, TransferError};
pub use factory::{create_connector, create_transfer_client, transfer_client_for};
#[cfg(feature = "remote-sftp")]
pub use factory::host_key_policy;
#[cfg(feature = "remote-local")]
pub use local::LocalConnector;
pub use motorlot_core::{IntegrityPolicy, RemoteBackend};
#[cfg(feature = "remote-sftp")]
pub use sftp::{fingerprint_matches, HostKeyPolicy, SftpConnector};
pub use traits::{RemoteConnector, RemoteSession, SessionError, SessionResult};
