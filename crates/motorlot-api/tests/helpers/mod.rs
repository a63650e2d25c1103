//! Test helpers: build an isolated upload app for integration tests.
//!
//! Every app gets its own temp directory holding the intake directory, the
//! root of the local remote-store backend and the local uploads directory.
//! Run with `cargo test -p motorlot-api`.

pub mod fixtures;

use async_trait::async_trait;
use axum_test::TestServer;
use motorlot_api::constants;
use motorlot_api::setup::{routes, services};
use motorlot_core::{Config, PipelineConfig};
use motorlot_storage::{
    LocalConnector, RemoteBackend, RemoteConnector, RemoteSession, SessionError, SessionResult,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

pub const PUBLIC_BASE: &str = "https://cdn.example.com/uploads";

/// API path prefix for tests (e.g. `/api/v0`).
pub fn api_path(path: &str) -> String {
    constants::api_path(path)
}

/// Test application: server plus the directory it writes into.
pub struct TestApp {
    pub server: TestServer,
    pub temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    pub fn intake_dir(&self) -> PathBuf {
        self.temp_dir.path().join("intake")
    }

    pub fn local_uploads_dir(&self) -> PathBuf {
        self.temp_dir.path().join("public")
    }

    /// Files currently staged in the intake directory.
    pub fn staged_files(&self) -> usize {
        count_entries(&self.intake_dir())
    }

    /// Objects stored in `bucket` on the remote store.
    pub fn stored_objects(&self, bucket: &str) -> usize {
        count_entries(&self.temp_dir.path().join("remote").join("uploads").join(bucket))
    }
}

fn count_entries(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| entries.count())
        .unwrap_or(0)
}

pub fn test_config(root: &Path, overrides: &[(&str, &str)]) -> Config {
    let path = |name: &str| root.join(name).to_string_lossy().into_owned();

    let mut vars: HashMap<String, String> = HashMap::from([
        ("PUBLIC_BASE_URL".to_string(), PUBLIC_BASE.to_string()),
        ("REMOTE_BACKEND".to_string(), "local".to_string()),
        ("REMOTE_LOCAL_ROOT".to_string(), path("remote")),
        ("UPLOAD_TEMP_DIR".to_string(), path("intake")),
        ("LOCAL_UPLOADS_DIR".to_string(), path("public")),
        ("REMOTE_CONNECT_RETRIES".to_string(), "0".to_string()),
        ("REMOTE_RETRY_BACKOFF_MS".to_string(), "1".to_string()),
        ("REMOTE_CONNECT_TIMEOUT_SECS".to_string(), "2".to_string()),
    ]);
    for (key, value) in overrides {
        vars.insert(key.to_string(), value.to_string());
    }

    Config(Box::new(
        PipelineConfig::from_lookup(|key| vars.get(key).cloned()).expect("valid test config"),
    ))
}

/// Setup test app backed by a local-directory remote store.
pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(&[]).await
}

pub async fn setup_test_app_with(overrides: &[(&str, &str)]) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let config = test_config(temp_dir.path(), overrides);
    let connector = LocalConnector::new(temp_dir.path().join("remote"))
        .await
        .expect("Failed to create local remote store");

    build_app(temp_dir, config, Arc::new(connector)).await
}

/// Setup test app whose remote store never accepts a session.
pub async fn setup_unreachable_app() -> TestApp {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let config = test_config(temp_dir.path(), &[]);

    build_app(temp_dir, config, Arc::new(UnreachableConnector)).await
}

async fn build_app(temp_dir: TempDir, config: Config, connector: Arc<dyn RemoteConnector>) -> TestApp {
    std::fs::create_dir_all(config.local_uploads_dir()).expect("Failed to create uploads dir");

    let state = services::initialize_services(&config, connector)
        .await
        .expect("Failed to initialize services");
    let router = routes::setup_routes(&config, state).expect("Failed to setup routes");
    let server = TestServer::new(router).expect("Failed to start test server");

    TestApp { server, temp_dir }
}

struct UnreachableConnector;

#[async_trait]
impl RemoteConnector for UnreachableConnector {
    async fn connect(&self) -> SessionResult<Box<dyn RemoteSession>> {
        Err(SessionError::Protocol(
            "ssh connect: connection refused".to_string(),
        ))
    }

    fn backend_type(&self) -> RemoteBackend {
        RemoteBackend::Sftp
    }
}
