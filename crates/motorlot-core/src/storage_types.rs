use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Remote file store backend types
///
/// Defined in core because configuration selects the backend before the
/// storage crate builds a connector for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteBackend {
    Sftp,
    Local,
}

impl FromStr for RemoteBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sftp" => Ok(RemoteBackend::Sftp),
            "local" => Ok(RemoteBackend::Local),
            _ => Err(anyhow::anyhow!("Invalid remote backend: {}", s)),
        }
    }
}

impl Display for RemoteBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            RemoteBackend::Sftp => write!(f, "sftp"),
            RemoteBackend::Local => write!(f, "local"),
        }
    }
}

/// What to do when the remote size differs from the local size after a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntegrityPolicy {
    /// Log the mismatch and keep the object.
    #[default]
    Warn,
    /// Remove the object and fail the transfer.
    Fail,
}

impl FromStr for IntegrityPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "warn" => Ok(IntegrityPolicy::Warn),
            "fail" => Ok(IntegrityPolicy::Fail),
            _ => Err(anyhow::anyhow!("Invalid integrity policy: {}", s)),
        }
    }
}
