use crate::traits::{RemoteConnector, RemoteSession, SessionError, SessionResult};
use crate::RemoteBackend;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

/// Remote store backed by a local directory
///
/// Implements the same session contract as the SFTP backend; used for
/// development, tests and single-host deployments where the web server
/// serves the uploads directory directly.
#[derive(Clone)]
pub struct LocalConnector {
    root: PathBuf,
}

impl LocalConnector {
    /// Create a new LocalConnector
    ///
    /// # Arguments
    /// * `root` - Directory that plays the role of the remote filesystem root
    pub async fn new(root: impl Into<PathBuf>) -> SessionResult<Self> {
        let root = root.into();

        fs::create_dir_all(&root).await.map_err(|e| {
            SessionError::Config(format!(
                "Failed to create remote root directory {}: {}",
                root.display(),
                e
            ))
        })?;

        Ok(LocalConnector { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl RemoteConnector for LocalConnector {
    async fn connect(&self) -> SessionResult<Box<dyn RemoteSession>> {
        if !fs::try_exists(&self.root).await.unwrap_or(false) {
            return Err(SessionError::Config(format!(
                "Remote root {} is missing",
                self.root.display()
            )));
        }
        Ok(Box::new(LocalSession {
            root: self.root.clone(),
        }))
    }

    fn backend_type(&self) -> RemoteBackend {
        RemoteBackend::Local
    }
}

struct LocalSession {
    root: PathBuf,
}

impl LocalSession {
    /// Map a remote path onto the root directory, refusing anything that could escape it
    fn resolve(&self, path: &str) -> SessionResult<PathBuf> {
        if path.contains('\\') {
            return Err(SessionError::InvalidPath(path.to_string()));
        }

        let relative = Path::new(path.trim_start_matches('/'));
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(SessionError::InvalidPath(path.to_string()));
        }

        Ok(self.root.join(relative))
    }
}

fn map_io(path: &str, err: std::io::Error) -> SessionError {
    match err.kind() {
        ErrorKind::NotFound => SessionError::NotFound(path.to_string()),
        ErrorKind::AlreadyExists => SessionError::AlreadyExists(path.to_string()),
        _ => SessionError::Io(err),
    }
}

#[async_trait]
impl RemoteSession for LocalSession {
    async fn exists(&self, path: &str) -> SessionResult<bool> {
        let target = self.resolve(path)?;
        Ok(fs::try_exists(&target).await?)
    }

    async fn create_dir(&self, path: &str, mode: u32) -> SessionResult<()> {
        let target = self.resolve(path)?;
        fs::create_dir(&target)
            .await
            .map_err(|e| map_io(path, e))?;
        self.set_permissions(path, mode).await
    }

    async fn upload(&self, local: &Path, remote: &str) -> SessionResult<u64> {
        let target = self.resolve(remote)?;
        let start = std::time::Instant::now();

        let written = fs::copy(local, &target).await.map_err(|e| map_io(remote, e))?;

        tracing::debug!(
            path = %target.display(),
            size_bytes = written,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local remote write complete"
        );
        Ok(written)
    }

    async fn size(&self, path: &str) -> SessionResult<u64> {
        let target = self.resolve(path)?;
        let metadata = fs::metadata(&target).await.map_err(|e| map_io(path, e))?;
        Ok(metadata.len())
    }

    #[cfg(unix)]
    async fn set_permissions(&self, path: &str, mode: u32) -> SessionResult<()> {
        use std::os::unix::fs::PermissionsExt;

        let target = self.resolve(path)?;
        fs::set_permissions(&target, std::fs::Permissions::from_mode(mode))
            .await
            .map_err(|e| map_io(path, e))
    }

    #[cfg(not(unix))]
    async fn set_permissions(&self, path: &str, _mode: u32) -> SessionResult<()> {
        self.resolve(path).map(|_| ())
    }

    async fn remove(&self, path: &str) -> SessionResult<()> {
        let target = self.resolve(path)?;
        fs::remove_file(&target).await.map_err(|e| map_io(path, e))
    }

    async fn close(&mut self) -> SessionResult<()> {
        Ok(())
    }
}
