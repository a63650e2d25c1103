//! Configuration module
//!
//! This module provides configuration structures for the upload API, the remote
//! file store session and the repair maintenance binaries. Everything is read
//! from environment variables (optionally seeded from a `.env` file).

use std::env;

use crate::models::Bucket;
use crate::storage_types::{IntegrityPolicy, RemoteBackend};
use crate::url_normalizer::{UrlNormalizer, UrlVerdict};

// Common constants
const SERVER_PORT: u16 = 3000;
const MAX_CONNECTIONS: u32 = 10;
const CONNECTION_TIMEOUT_SECS: u64 = 30;

// Upload ceilings
const MAX_FILE_SIZE_MB: usize = 5;
const MAX_FILES_SINGLE: usize = 1;
const MAX_FILES_BRANDS: usize = 10;
const MAX_FILES_VEHICLES: usize = 40;
const MAX_CONCURRENT_TRANSFERS: usize = 4;

// Remote session
const REMOTE_PORT: u16 = 22;
const REMOTE_CONNECT_RETRIES: u32 = 3;
const REMOTE_RETRY_BACKOFF_MS: u64 = 250;
const REMOTE_CONNECT_TIMEOUT_SECS: u64 = 15;

const SWEEP_BATCH_SIZE: i64 = 500;

const DEFAULT_ALLOWED_BUCKETS: &str = "general,vehicles,brands,options,users,test";
const DEFAULT_BLOCKED_PLACEHOLDER_HOSTS: &str =
    "example.com,example.org,placeholder.com,via.placeholder.com,localhost,127.0.0.1";
const DEFAULT_LOCAL_PATH_MARKERS: &str =
    "/Users/,/Desktop/,/tmp/,/var/folders/,/public/uploads/,file://,C:\\";
const DEFAULT_PLACEHOLDER_IMAGE_BASE: &str = "https://placehold.co/800x600";

/// Base configuration shared by the API and the maintenance binaries
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub environment: String,
}

/// Upload pipeline configuration
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub base: BaseConfig,
    /// Only required by the repair sweep.
    pub database_url: Option<String>,
    // Public URL scheme
    pub public_base_url: String,
    pub legacy_public_bases: Vec<String>,
    pub blocked_placeholder_hosts: Vec<String>,
    pub local_path_markers: Vec<String>,
    pub placeholder_image_base: String,
    // Remote file store
    pub remote_backend: RemoteBackend,
    pub remote_host: Option<String>,
    pub remote_port: u16,
    pub remote_username: Option<String>,
    pub remote_password: Option<String>,
    /// Expected SHA-256 fingerprint of the remote host key.
    pub remote_host_key: Option<String>,
    /// OpenSSH known_hosts file to check the remote host key against.
    pub remote_known_hosts: Option<String>,
    pub remote_accept_unknown_host_key: bool,
    pub remote_uploads_root: String,
    pub remote_local_root: Option<String>,
    pub remote_connect_retries: u32,
    pub remote_retry_backoff_ms: u64,
    pub remote_connect_timeout_secs: u64,
    // Intake
    pub upload_temp_dir: String,
    pub local_uploads_dir: String,
    pub max_file_size_bytes: usize,
    pub max_files_single: usize,
    pub max_files_brands: usize,
    pub max_files_vehicles: usize,
    pub allowed_buckets: Vec<String>,
    // Orchestration
    pub max_concurrent_transfers: usize,
    pub integrity_policy: IntegrityPolicy,
    pub rollback_on_batch_failure: bool,
    // Repair sweep
    pub sweep_batch_size: i64,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<PipelineConfig>);

impl Config {
    fn as_pipeline(&self) -> &PipelineConfig {
        &self.0
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let environment = self.as_pipeline().base.environment.to_lowercase();
        environment == "production" || environment == "prod"
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = PipelineConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.as_pipeline().validate()
    }

    // Convenience getters for common fields
    pub fn server_port(&self) -> u16 {
        self.as_pipeline().base.server_port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.as_pipeline().base.cors_origins
    }

    pub fn environment(&self) -> &str {
        &self.as_pipeline().base.environment
    }

    pub fn database_url(&self) -> Option<&str> {
        self.as_pipeline().database_url.as_deref()
    }

    pub fn db_max_connections(&self) -> u32 {
        self.as_pipeline().base.db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.as_pipeline().base.db_timeout_seconds
    }

    pub fn public_base_url(&self) -> &str {
        &self.as_pipeline().public_base_url
    }

    pub fn legacy_public_bases(&self) -> &[String] {
        &self.as_pipeline().legacy_public_bases
    }

    pub fn blocked_placeholder_hosts(&self) -> &[String] {
        &self.as_pipeline().blocked_placeholder_hosts
    }

    pub fn local_path_markers(&self) -> &[String] {
        &self.as_pipeline().local_path_markers
    }

    pub fn placeholder_image_base(&self) -> &str {
        &self.as_pipeline().placeholder_image_base
    }

    pub fn remote_backend(&self) -> RemoteBackend {
        self.as_pipeline().remote_backend
    }

    pub fn remote_host(&self) -> Option<&str> {
        self.as_pipeline().remote_host.as_deref()
    }

    pub fn remote_port(&self) -> u16 {
        self.as_pipeline().remote_port
    }

    pub fn remote_username(&self) -> Option<&str> {
        self.as_pipeline().remote_username.as_deref()
    }

    pub fn remote_password(&self) -> Option<&str> {
        self.as_pipeline().remote_password.as_deref()
    }

    pub fn remote_host_key(&self) -> Option<&str> {
        self.as_pipeline().remote_host_key.as_deref()
    }

    pub fn remote_known_hosts(&self) -> Option<&str> {
        self.as_pipeline().remote_known_hosts.as_deref()
    }

    pub fn remote_accept_unknown_host_key(&self) -> bool {
        self.as_pipeline().remote_accept_unknown_host_key
    }

    pub fn remote_uploads_root(&self) -> &str {
        &self.as_pipeline().remote_uploads_root
    }

    pub fn remote_local_root(&self) -> Option<&str> {
        self.as_pipeline().remote_local_root.as_deref()
    }

    pub fn remote_connect_retries(&self) -> u32 {
        self.as_pipeline().remote_connect_retries
    }

    pub fn remote_retry_backoff_ms(&self) -> u64 {
        self.as_pipeline().remote_retry_backoff_ms
    }

    pub fn remote_connect_timeout_secs(&self) -> u64 {
        self.as_pipeline().remote_connect_timeout_secs
    }

    pub fn upload_temp_dir(&self) -> &str {
        &self.as_pipeline().upload_temp_dir
    }

    pub fn local_uploads_dir(&self) -> &str {
        &self.as_pipeline().local_uploads_dir
    }

    pub fn max_file_size_bytes(&self) -> usize {
        self.as_pipeline().max_file_size_bytes
    }

    pub fn max_files_single(&self) -> usize {
        self.as_pipeline().max_files_single
    }

    pub fn max_files_brands(&self) -> usize {
        self.as_pipeline().max_files_brands
    }

    pub fn max_files_vehicles(&self) -> usize {
        self.as_pipeline().max_files_vehicles
    }

    pub fn allowed_buckets(&self) -> &[String] {
        &self.as_pipeline().allowed_buckets
    }

    pub fn is_bucket_allowed(&self, bucket: &Bucket) -> bool {
        self.allowed_buckets()
            .iter()
            .any(|allowed| allowed == bucket.as_str())
    }

    pub fn max_concurrent_transfers(&self) -> usize {
        self.as_pipeline().max_concurrent_transfers
    }

    pub fn integrity_policy(&self) -> IntegrityPolicy {
        self.as_pipeline().integrity_policy
    }

    pub fn rollback_on_batch_failure(&self) -> bool {
        self.as_pipeline().rollback_on_batch_failure
    }

    pub fn sweep_batch_size(&self) -> i64 {
        self.as_pipeline().sweep_batch_size
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_bool(raw: Option<String>, default: bool) -> bool {
    raw.map(|s| s.trim().to_lowercase())
        .and_then(|s| match s.as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    ///
    /// `from_env` passes the process environment; tests pass a map.
    pub fn from_lookup<F>(var: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = var("ENVIRONMENT")
            .or_else(|| var("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let base = BaseConfig {
            server_port: var("PORT")
                .unwrap_or_else(|| SERVER_PORT.to_string())
                .parse()
                .unwrap_or(SERVER_PORT),
            cors_origins: split_list(&var("CORS_ORIGINS").unwrap_or_else(|| "*".to_string())),
            db_max_connections: var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|| MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: var("DB_TIMEOUT_SECONDS")
                .unwrap_or_else(|| CONNECTION_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            environment,
        };

        let remote_backend = match var("REMOTE_BACKEND") {
            Some(raw) => raw.parse::<RemoteBackend>()?,
            None => RemoteBackend::Sftp,
        };

        let integrity_policy = match var("INTEGRITY_POLICY") {
            Some(raw) => raw.parse::<IntegrityPolicy>()?,
            None => IntegrityPolicy::default(),
        };

        let max_file_size_mb = var("MAX_FILE_SIZE_MB")
            .unwrap_or_else(|| MAX_FILE_SIZE_MB.to_string())
            .parse::<usize>()
            .unwrap_or(MAX_FILE_SIZE_MB);

        let config = PipelineConfig {
            base,
            database_url: var("DATABASE_URL").filter(|s| !s.is_empty()),
            public_base_url: var("PUBLIC_BASE_URL")
                .filter(|s| !s.is_empty())
                .map(|s| s.trim_end_matches('/').to_string())
                .ok_or_else(|| anyhow::anyhow!("PUBLIC_BASE_URL must be set"))?,
            legacy_public_bases: split_list(&var("LEGACY_PUBLIC_BASES").unwrap_or_default())
                .into_iter()
                .map(|s| s.trim_end_matches('/').to_string())
                .collect(),
            blocked_placeholder_hosts: split_list(
                &var("BLOCKED_PLACEHOLDER_HOSTS")
                    .unwrap_or_else(|| DEFAULT_BLOCKED_PLACEHOLDER_HOSTS.to_string()),
            )
            .into_iter()
            .map(|s| s.to_lowercase())
            .collect(),
            local_path_markers: split_list(
                &var("LOCAL_PATH_MARKERS").unwrap_or_else(|| DEFAULT_LOCAL_PATH_MARKERS.to_string()),
            ),
            placeholder_image_base: var("PLACEHOLDER_IMAGE_BASE")
                .unwrap_or_else(|| DEFAULT_PLACEHOLDER_IMAGE_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            remote_backend,
            remote_host: var("REMOTE_HOST").filter(|s| !s.is_empty()),
            remote_port: var("REMOTE_PORT")
                .unwrap_or_else(|| REMOTE_PORT.to_string())
                .parse()
                .unwrap_or(REMOTE_PORT),
            remote_username: var("REMOTE_USERNAME").filter(|s| !s.is_empty()),
            remote_password: var("REMOTE_PASSWORD").filter(|s| !s.is_empty()),
            remote_host_key: var("REMOTE_HOST_KEY")
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            remote_known_hosts: var("REMOTE_KNOWN_HOSTS").filter(|s| !s.is_empty()),
            remote_accept_unknown_host_key: parse_bool(
                var("REMOTE_ACCEPT_UNKNOWN_HOST_KEY"),
                false,
            ),
            remote_uploads_root: var("REMOTE_UPLOADS_ROOT")
                .unwrap_or_else(|| "uploads".to_string())
                .trim_end_matches('/')
                .to_string(),
            remote_local_root: var("REMOTE_LOCAL_ROOT").filter(|s| !s.is_empty()),
            remote_connect_retries: var("REMOTE_CONNECT_RETRIES")
                .unwrap_or_else(|| REMOTE_CONNECT_RETRIES.to_string())
                .parse()
                .unwrap_or(REMOTE_CONNECT_RETRIES),
            remote_retry_backoff_ms: var("REMOTE_RETRY_BACKOFF_MS")
                .unwrap_or_else(|| REMOTE_RETRY_BACKOFF_MS.to_string())
                .parse()
                .unwrap_or(REMOTE_RETRY_BACKOFF_MS),
            remote_connect_timeout_secs: var("REMOTE_CONNECT_TIMEOUT_SECS")
                .unwrap_or_else(|| REMOTE_CONNECT_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(REMOTE_CONNECT_TIMEOUT_SECS),
            upload_temp_dir: var("UPLOAD_TEMP_DIR").unwrap_or_else(|| {
                env::temp_dir()
                    .join("motorlot-intake")
                    .to_string_lossy()
                    .into_owned()
            }),
            local_uploads_dir: var("LOCAL_UPLOADS_DIR")
                .unwrap_or_else(|| "./public/uploads".to_string()),
            max_file_size_bytes: max_file_size_mb * 1024 * 1024,
            max_files_single: var("MAX_FILES_SINGLE")
                .unwrap_or_else(|| MAX_FILES_SINGLE.to_string())
                .parse()
                .unwrap_or(MAX_FILES_SINGLE),
            max_files_brands: var("MAX_FILES_BRANDS")
                .unwrap_or_else(|| MAX_FILES_BRANDS.to_string())
                .parse()
                .unwrap_or(MAX_FILES_BRANDS),
            max_files_vehicles: var("MAX_FILES_VEHICLES")
                .unwrap_or_else(|| MAX_FILES_VEHICLES.to_string())
                .parse()
                .unwrap_or(MAX_FILES_VEHICLES),
            allowed_buckets: split_list(
                &var("ALLOWED_BUCKETS").unwrap_or_else(|| DEFAULT_ALLOWED_BUCKETS.to_string()),
            ),
            max_concurrent_transfers: var("MAX_CONCURRENT_TRANSFERS")
                .unwrap_or_else(|| MAX_CONCURRENT_TRANSFERS.to_string())
                .parse()
                .unwrap_or(MAX_CONCURRENT_TRANSFERS),
            integrity_policy,
            rollback_on_batch_failure: parse_bool(var("ROLLBACK_ON_BATCH_FAILURE"), true),
            sweep_batch_size: var("SWEEP_BATCH_SIZE")
                .unwrap_or_else(|| SWEEP_BATCH_SIZE.to_string())
                .parse()
                .unwrap_or(SWEEP_BATCH_SIZE),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        let public_base = url::Url::parse(&self.public_base_url)
            .map_err(|e| anyhow::anyhow!("PUBLIC_BASE_URL is not a valid URL: {}", e))?;
        if !matches!(public_base.scheme(), "http" | "https") {
            return Err(anyhow::anyhow!("PUBLIC_BASE_URL must use http or https"));
        }

        url::Url::parse(&self.placeholder_image_base)
            .map_err(|e| anyhow::anyhow!("PLACEHOLDER_IMAGE_BASE is not a valid URL: {}", e))?;

        if self.max_file_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_FILE_SIZE_MB must be greater than 0"));
        }

        if self.max_files_single == 0 || self.max_files_brands == 0 || self.max_files_vehicles == 0
        {
            return Err(anyhow::anyhow!("Per-route file count limits must be at least 1"));
        }

        if self.max_concurrent_transfers == 0 {
            return Err(anyhow::anyhow!(
                "MAX_CONCURRENT_TRANSFERS must be at least 1"
            ));
        }

        if self.sweep_batch_size <= 0 {
            return Err(anyhow::anyhow!("SWEEP_BATCH_SIZE must be greater than 0"));
        }

        let mut buckets = vec![Bucket::general(), Bucket::brands(), Bucket::vehicles()];
        for bucket in &self.allowed_buckets {
            buckets.push(
                Bucket::new(bucket).map_err(|e| {
                    anyhow::anyhow!("ALLOWED_BUCKETS contains an invalid name: {}", e)
                })?,
            );
        }

        // Every URL handed out at transfer time must pass validation.
        let normalizer = UrlNormalizer::from_pipeline(self)
            .map_err(|e| anyhow::anyhow!("Invalid URL configuration: {}", e))?;
        for bucket in &buckets {
            let sample = normalizer.canonical_url(&format!("{}/{}.jpg", bucket, "0".repeat(32)));
            if let UrlVerdict::Invalid(reason) = normalizer.classify(&sample) {
                return Err(anyhow::anyhow!(
                    "PUBLIC_BASE_URL and bucket '{}' produce urls that fail validation ({}); \
                     adjust LOCAL_PATH_MARKERS, BLOCKED_PLACEHOLDER_HOSTS or the base",
                    bucket,
                    reason
                ));
            }
        }

        // Validate remote backend configuration
        match self.remote_backend {
            RemoteBackend::Sftp => {
                if self.remote_host.is_none() {
                    return Err(anyhow::anyhow!(
                        "REMOTE_HOST must be set when using the sftp remote backend"
                    ));
                }
                if self.remote_username.is_none() || self.remote_password.is_none() {
                    return Err(anyhow::anyhow!(
                        "REMOTE_USERNAME and REMOTE_PASSWORD must be set when using the sftp remote backend"
                    ));
                }
                if self.remote_host_key.is_none()
                    && self.remote_known_hosts.is_none()
                    && !self.remote_accept_unknown_host_key
                {
                    return Err(anyhow::anyhow!(
                        "REMOTE_HOST_KEY or REMOTE_KNOWN_HOSTS must be set when using the sftp remote backend \
                         (set REMOTE_ACCEPT_UNKNOWN_HOST_KEY=true to skip host key verification)"
                    ));
                }
            }
            RemoteBackend::Local => {
                if self.remote_local_root.is_none() {
                    return Err(anyhow::anyhow!(
                        "REMOTE_LOCAL_ROOT must be set when using the local remote backend"
                    ));
                }
            }
        }

        Ok(())
    }
}
