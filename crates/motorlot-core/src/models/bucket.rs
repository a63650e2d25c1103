use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

const MAX_BUCKET_LEN: usize = 64;

/// A logical subdirectory under the remote uploads root (`vehicles`, `brands`, ...).
///
/// Only lowercase ASCII letters, digits, `-` and `_` are accepted, so a bucket
/// can never introduce a path separator or traversal into a remote key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Bucket(String);

impl Bucket {
    pub fn new(name: impl Into<String>) -> Result<Self, AppError> {
        let name = name.into();
        if name.is_empty() || name.len() > MAX_BUCKET_LEN {
            return Err(AppError::InvalidInput(format!(
                "Bucket name must be 1-{} characters",
                MAX_BUCKET_LEN
            )));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
        {
            return Err(AppError::InvalidInput(format!(
                "Invalid bucket name: {}",
                name
            )));
        }
        Ok(Bucket(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn vehicles() -> Self {
        Bucket("vehicles".to_string())
    }

    pub fn brands() -> Self {
        Bucket("brands".to_string())
    }

    pub fn general() -> Self {
        Bucket("general".to_string())
    }
}

impl FromStr for Bucket {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Bucket::new(s)
    }
}

impl TryFrom<String> for Bucket {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Bucket::new(value)
    }
}

impl From<Bucket> for String {
    fn from(bucket: Bucket) -> Self {
        bucket.0
    }
}

impl AsRef<str> for Bucket {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for Bucket {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}
