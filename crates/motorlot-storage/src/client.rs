//! Remote Transfer Client
//!
//! Moves one staged local file into the remote store per call. Every call
//! opens its own session and releases it on every exit path.

use crate::keys::{extension_of, generate_remote_key, remote_path};
use crate::traits::{RemoteConnector, RemoteSession, SessionError};
use motorlot_core::{
    check_remote_key, AppError, Bucket, IntegrityPolicy, TransferOutcome, UrlNormalizer,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

const DIR_MODE: u32 = 0o755;
const FILE_MODE: u32 = 0o644;

/// Failures of a single transfer
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("Remote connection failed after {attempts} attempt(s): {reason}")]
    RemoteConnect { attempts: u32, reason: String },

    #[error("Remote directory {path} could not be verified or created: {reason}")]
    RemoteDirectory { path: String, reason: String },

    #[error("Remote write to {path} failed: {reason}")]
    RemoteWrite { path: String, reason: String },

    #[error("Size mismatch for {key}: local {local_size} bytes, remote {remote_size} bytes")]
    IntegrityMismatch {
        key: String,
        local_size: u64,
        remote_size: u64,
    },

    #[error("Local file {path} unreadable: {source}")]
    LocalRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid remote key: {0}")]
    InvalidKey(String),
}

impl From<TransferError> for AppError {
    fn from(err: TransferError) -> Self {
        match err {
            TransferError::RemoteConnect { .. } => AppError::RemoteConnect(err.to_string()),
            TransferError::RemoteDirectory { .. } => AppError::RemoteDirectory(err.to_string()),
            TransferError::RemoteWrite { .. } => AppError::RemoteWrite(err.to_string()),
            TransferError::IntegrityMismatch { .. } => {
                AppError::IntegrityMismatch(err.to_string())
            }
            TransferError::InvalidKey(key) => AppError::InvalidInput(format!("Invalid key: {}", key)),
            TransferError::LocalRead { .. } => AppError::Internal(err.to_string()),
        }
    }
}

/// Session establishment retry settings
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub retries: u32,
    /// Delay before the first retry; doubled on every further retry.
    pub initial_backoff: Duration,
    /// Upper bound for a single connection attempt.
    pub connect_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            initial_backoff: Duration::from_millis(250),
            connect_timeout: Duration::from_secs(15),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

#[derive(Clone)]
pub struct RemoteTransferClient {
    connector: Arc<dyn RemoteConnector>,
    uploads_root: String,
    normalizer: Arc<UrlNormalizer>,
    retry: RetryPolicy,
    integrity: IntegrityPolicy,
}

impl RemoteTransferClient {
    pub fn new(
        connector: Arc<dyn RemoteConnector>,
        uploads_root: impl Into<String>,
        normalizer: Arc<UrlNormalizer>,
    ) -> Self {
        Self {
            connector,
            uploads_root: uploads_root.into().trim_end_matches('/').to_string(),
            normalizer,
            retry: RetryPolicy::default(),
            integrity: IntegrityPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_integrity_policy(mut self, integrity: IntegrityPolicy) -> Self {
        self.integrity = integrity;
        self
    }

    pub fn normalizer(&self) -> &UrlNormalizer {
        &self.normalizer
    }

    pub fn uploads_root(&self) -> &str {
        &self.uploads_root
    }

    /// Transfer `local_path` into `bucket` under a fresh random filename.
    ///
    /// The extension of `local_path` is preserved. On success the object is
    /// retrievable at the returned key.
    #[tracing::instrument(skip(self, bucket), fields(bucket = %bucket, backend = %self.connector.backend_type()))]
    pub async fn transfer(
        &self,
        local_path: &Path,
        bucket: &Bucket,
    ) -> Result<TransferOutcome, TransferError> {
        let local_size = tokio::fs::metadata(local_path)
            .await
            .map_err(|source| TransferError::LocalRead {
                path: local_path.to_path_buf(),
                source,
            })?
            .len();

        let (remote_key, token) = generate_remote_key(bucket, &extension_of(local_path));
        let start = Instant::now();

        let mut session = self.open_session().await?;
        let result = self
            .transfer_with(session.as_ref(), local_path, bucket, &remote_key, local_size)
            .await;
        self.release(session.as_mut()).await;

        let byte_size = result?;

        tracing::info!(
            key = %remote_key,
            size_bytes = byte_size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Remote transfer successful"
        );

        Ok(TransferOutcome {
            bucket: bucket.clone(),
            public_url: self.normalizer.canonical_url(&remote_key),
            remote_key,
            unique_id: token,
            byte_size,
        })
    }

    /// Remove the object at `remote_key`.
    ///
    /// Returns `false` when the key is malformed, the object does not exist or
    /// the remote call fails for any other reason.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, remote_key: &str) -> bool {
        if check_remote_key(remote_key).is_err() {
            let err = TransferError::InvalidKey(remote_key.to_string());
            tracing::debug!(error = %err, "Refusing to delete");
            return false;
        }

        let mut session = match self.open_session().await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(error = %e, key = %remote_key, "Remote delete could not open a session");
                return false;
            }
        };

        let path = remote_path(&self.uploads_root, remote_key);
        let result = session.remove(&path).await;
        self.release(session.as_mut()).await;

        match result {
            Ok(()) => {
                tracing::info!(key = %remote_key, "Remote object deleted");
                true
            }
            Err(SessionError::NotFound(_)) => {
                tracing::debug!(key = %remote_key, "Remote object not found");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, key = %remote_key, "Remote delete failed");
                false
            }
        }
    }

    /// Open and release one session; used by health checks.
    pub async fn check_connectivity(&self) -> Result<(), TransferError> {
        let mut session = self.open_session().await?;
        self.release(session.as_mut()).await;
        Ok(())
    }

    async fn open_session(&self) -> Result<Box<dyn RemoteSession>, TransferError> {
        let attempts = self.retry.retries.saturating_add(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            if attempt > 1 {
                tokio::time::sleep(self.retry.backoff(attempt - 1)).await;
            }

            match tokio::time::timeout(self.retry.connect_timeout, self.connector.connect()).await {
                Ok(Ok(session)) => return Ok(session),
                Ok(Err(e)) => last_error = e.to_string(),
                Err(_) => {
                    last_error = format!(
                        "timed out after {}s",
                        self.retry.connect_timeout.as_secs_f64()
                    )
                }
            }

            tracing::warn!(
                attempt = attempt,
                max_attempts = attempts,
                error = %last_error,
                "Remote session attempt failed"
            );
        }

        Err(TransferError::RemoteConnect {
            attempts,
            reason: last_error,
        })
    }

    async fn release(&self, session: &mut dyn RemoteSession) {
        if let Err(e) = session.close().await {
            tracing::warn!(error = %e, "Failed to release remote session");
        }
    }

    async fn transfer_with(
        &self,
        session: &dyn RemoteSession,
        local_path: &Path,
        bucket: &Bucket,
        remote_key: &str,
        local_size: u64,
    ) -> Result<u64, TransferError> {
        if !self.uploads_root.is_empty() {
            ensure_dir(session, &self.uploads_root).await?;
        }
        ensure_dir(session, &remote_path(&self.uploads_root, bucket.as_str())).await?;

        let path = remote_path(&self.uploads_root, remote_key);

        if let Err(e) = session.upload(local_path, &path).await {
            discard_partial(session, &path).await;
            return Err(TransferError::RemoteWrite {
                path,
                reason: e.to_string(),
            });
        }

        let remote_size = match session.size(&path).await {
            Ok(size) => size,
            Err(e) => {
                discard_partial(session, &path).await;
                return Err(TransferError::RemoteWrite {
                    path,
                    reason: format!("could not stat written object: {}", e),
                });
            }
        };

        if remote_size != local_size {
            match self.integrity {
                IntegrityPolicy::Warn => {
                    tracing::warn!(
                        key = %remote_key,
                        local_size = local_size,
                        remote_size = remote_size,
                        "Remote size differs from local size"
                    );
                }
                IntegrityPolicy::Fail => {
                    tracing::error!(
                        key = %remote_key,
                        local_size = local_size,
                        remote_size = remote_size,
                        "Remote size differs from local size, removing object"
                    );
                    discard_partial(session, &path).await;
                    return Err(TransferError::IntegrityMismatch {
                        key: remote_key.to_string(),
                        local_size,
                        remote_size,
                    });
                }
            }
        }

        if let Err(e) = session.set_permissions(&path, FILE_MODE).await {
            tracing::debug!(error = %e, key = %remote_key, "Could not normalize remote permissions");
        }

        Ok(remote_size)
    }
}

/// Check-then-create; a directory that already exists (or appears while we
/// race another transfer) counts as success.
async fn ensure_dir(session: &dyn RemoteSession, path: &str) -> Result<(), TransferError> {
    if let Ok(true) = session.exists(path).await {
        return Ok(());
    }

    match session.create_dir(path, DIR_MODE).await {
        Ok(()) | Err(SessionError::AlreadyExists(_)) => Ok(()),
        Err(e) => match session.exists(path).await {
            Ok(true) => Ok(()),
            _ => Err(TransferError::RemoteDirectory {
                path: path.to_string(),
                reason: e.to_string(),
            }),
        },
    }
}

async fn discard_partial(session: &dyn RemoteSession, path: &str) {
    match session.remove(path).await {
        Ok(()) | Err(SessionError::NotFound(_)) => {}
        Err(e) => {
            tracing::warn!(error = %e, path = %path, "Failed to remove partial remote object")
        }
    }
}

#[cfg(all(test, feature = "remote-local"))]
mod tests {
    use super::*;
    use crate::local::LocalConnector;
    use crate::traits::SessionResult;
    use crate::RemoteBackend;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::{tempdir, TempDir};

    /// Wraps the local backend and injects failures
    #[derive(Default)]
    struct Faults {
        failing_connects: AtomicU32,
        fail_upload: bool,
        fail_mkdir: bool,
        size_skew: u64,
        closes: AtomicU32,
    }

    struct FaultyConnector {
        inner: LocalConnector,
        faults: Arc<Faults>,
    }

    struct FaultySession {
        inner: Box<dyn RemoteSession>,
        root: PathBuf,
        faults: Arc<Faults>,
    }

    #[async_trait]
    impl RemoteConnector for FaultyConnector {
        async fn connect(&self) -> SessionResult<Box<dyn RemoteSession>> {
            let remaining = self.faults.failing_connects.load(Ordering::SeqCst);
            if remaining > 0 {
                self.faults.failing_connects.store(remaining - 1, Ordering::SeqCst);
                return Err(SessionError::Protocol("connection refused".to_string()));
            }
            Ok(Box::new(FaultySession {
                inner: self.inner.connect().await?,
                root: self.inner.root().to_path_buf(),
                faults: self.faults.clone(),
            }))
        }

        fn backend_type(&self) -> RemoteBackend {
            RemoteBackend::Local
        }
    }

    #[async_trait]
    impl RemoteSession for FaultySession {
        async fn exists(&self, path: &str) -> SessionResult<bool> {
            self.inner.exists(path).await
        }

        async fn create_dir(&self, path: &str, mode: u32) -> SessionResult<()> {
            if self.faults.fail_mkdir {
                return Err(SessionError::Protocol("permission denied".to_string()));
            }
            self.inner.create_dir(path, mode).await
        }

        async fn upload(&self, local: &Path, remote: &str) -> SessionResult<u64> {
            if self.faults.fail_upload {
                std::fs::write(self.root.join(remote), b"partial").ok();
                return Err(SessionError::Protocol("connection reset".to_string()));
            }
            self.inner.upload(local, remote).await
        }

        async fn size(&self, path: &str) -> SessionResult<u64> {
            Ok(self.inner.size(path).await? + self.faults.size_skew)
        }

        async fn set_permissions(&self, path: &str, mode: u32) -> SessionResult<()> {
            self.inner.set_permissions(path, mode).await
        }

        async fn remove(&self, path: &str) -> SessionResult<()> {
            self.inner.remove(path).await
        }

        async fn close(&mut self) -> SessionResult<()> {
            self.faults.closes.fetch_add(1, Ordering::SeqCst);
            self.inner.close().await
        }
    }

    struct Fixture {
        _local: TempDir,
        remote: TempDir,
        source: PathBuf,
        faults: Arc<Faults>,
        client: RemoteTransferClient,
    }

    async fn fixture(faults: Faults) -> Fixture {
        let local = tempdir().unwrap();
        let remote = tempdir().unwrap();

        let source = local.path().join("staged.jpg");
        std::fs::write(&source, vec![0xffu8; 2048]).unwrap();

        let faults = Arc::new(faults);
        let connector = FaultyConnector {
            inner: LocalConnector::new(remote.path()).await.unwrap(),
            faults: faults.clone(),
        };
        let normalizer = Arc::new(
            UrlNormalizer::new("https://cdn.example.com/uploads", "https://placehold.co/800x600")
                .unwrap(),
        );
        let client = RemoteTransferClient::new(Arc::new(connector), "uploads", normalizer)
            .with_retry(RetryPolicy {
                retries: 2,
                initial_backoff: Duration::from_millis(1),
                connect_timeout: Duration::from_secs(5),
            });

        Fixture {
            _local: local,
            remote,
            source,
            faults,
            client,
        }
    }

    fn bucket_files(fixture: &Fixture, bucket: &str) -> usize {
        std::fs::read_dir(fixture.remote.path().join("uploads").join(bucket))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_transfer_creates_bucket_and_object() {
        let fx = fixture(Faults::default()).await;

        let outcome = fx.client.transfer(&fx.source, &Bucket::vehicles()).await.unwrap();

        assert!(outcome.remote_key.starts_with("vehicles/"));
        assert!(outcome.remote_key.ends_with(".jpg"));
        assert_eq!(outcome.unique_id.len(), 32);
        assert_eq!(outcome.byte_size, 2048);
        assert_eq!(
            outcome.public_url,
            format!("https://cdn.example.com/uploads/{}", outcome.remote_key)
        );
        assert!(fx.client.normalizer().is_valid(&outcome.public_url));
        assert!(fx.remote.path().join("uploads").join(&outcome.remote_key).is_file());
        assert_eq!(fx.faults.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_concurrent_transfers_into_same_bucket() {
        let fx = fixture(Faults::default()).await;
        let bucket = Bucket::brands();

        let (a, b, c) = tokio::join!(
            fx.client.transfer(&fx.source, &bucket),
            fx.client.transfer(&fx.source, &bucket),
            fx.client.transfer(&fx.source, &bucket),
        );

        let keys = [a.unwrap().remote_key, b.unwrap().remote_key, c.unwrap().remote_key];
        assert_ne!(keys[0], keys[1]);
        assert_ne!(keys[1], keys[2]);
        assert_eq!(bucket_files(&fx, "brands"), 3);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_connect_retries_then_succeeds() {
        let fx = fixture(Faults {
            failing_connects: AtomicU32::new(2),
            ..Default::default()
        })
        .await;

        assert!(fx.client.transfer(&fx.source, &Bucket::vehicles()).await.is_ok());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_connect_gives_up_after_retries() {
        let fx = fixture(Faults {
            failing_connects: AtomicU32::new(10),
            ..Default::default()
        })
        .await;

        let err = fx.client.transfer(&fx.source, &Bucket::vehicles()).await.unwrap_err();
        assert!(matches!(err, TransferError::RemoteConnect { attempts: 3, .. }));
        assert_eq!(fx.faults.closes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_directory_failure_releases_session() {
        let fx = fixture(Faults {
            fail_mkdir: true,
            ..Default::default()
        })
        .await;

        let err = fx.client.transfer(&fx.source, &Bucket::vehicles()).await.unwrap_err();
        assert!(matches!(err, TransferError::RemoteDirectory { .. }));
        assert_eq!(fx.faults.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_failed_write_removes_partial_object() {
        let fx = fixture(Faults {
            fail_upload: true,
            ..Default::default()
        })
        .await;

        let err = fx.client.transfer(&fx.source, &Bucket::vehicles()).await.unwrap_err();
        assert!(matches!(err, TransferError::RemoteWrite { .. }));
        assert_eq!(bucket_files(&fx, "vehicles"), 0);
        assert_eq!(fx.faults.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_size_mismatch_warns_by_default() {
        let fx = fixture(Faults {
            size_skew: 1,
            ..Default::default()
        })
        .await;

        let outcome = fx.client.transfer(&fx.source, &Bucket::vehicles()).await.unwrap();
        assert_eq!(outcome.byte_size, 2049);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_size_mismatch_fails_under_strict_policy() {
        let mut fx = fixture(Faults {
            size_skew: 1,
            ..Default::default()
        })
        .await;
        fx.client = fx.client.clone().with_integrity_policy(IntegrityPolicy::Fail);

        let err = fx.client.transfer(&fx.source, &Bucket::vehicles()).await.unwrap_err();
        assert!(matches!(err, TransferError::IntegrityMismatch { local_size: 2048, remote_size: 2049, .. }));
        assert_eq!(bucket_files(&fx, "vehicles"), 0);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_missing_local_file() {
        let fx = fixture(Faults::default()).await;

        let err = fx
            .client
            .transfer(&fx.source.with_file_name("gone.jpg"), &Bucket::vehicles())
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::LocalRead { .. }));
        assert_eq!(fx.faults.closes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_delete_round_trip() {
        let fx = fixture(Faults::default()).await;
        let outcome = fx.client.transfer(&fx.source, &Bucket::vehicles()).await.unwrap();

        assert!(fx.client.delete(&outcome.remote_key).await);
        assert!(!fx.client.delete(&outcome.remote_key).await);
        assert!(!fx.client.delete("../uploads/vehicles/x.jpg").await);
        assert!(!fx.client.delete("vehicles").await);
    }
}
