//! Common test utilities and helpers
//!
//! Shared setup for the HTTP-level integration tests: application state
//! over a temporary data directory, a scripted origin for pull-through
//! tests, and builders for small but well-formed package fixtures.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::http::{HeaderMap, StatusCode};
use axum_test::TestServer;
use bytes::Bytes;
use flate2::{write::GzEncoder, Compression};
use tempfile::TempDir;

use pypi_depot::config::Config;
use pypi_depot::proxy::{Origin, OriginResponse, ProxyCache};
use pypi_depot::{app, AppError, AppResult, AppState, FsStorage};

/// Test server over a hosted-mode (no upstream) state.
pub struct TestSetup {
    pub temp_dir: TempDir,
    pub state: Arc<AppState>,
    pub server: TestServer,
}

pub fn hosted_setup() -> TestSetup {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let state = Arc::new(AppState {
        store: Arc::new(FsStorage::new(temp_dir.path())),
        config: Arc::new(Config::default()),
        proxy: None,
    });
    let server = TestServer::new(app(state.clone())).expect("should create test server");
    TestSetup {
        temp_dir,
        state,
        server,
    }
}

pub fn proxy_setup(origin: Arc<ScriptedOrigin>, stale_read_through: bool) -> TestSetup {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let state = Arc::new(AppState {
        store: Arc::new(FsStorage::new(temp_dir.path())),
        config: Arc::new(Config::default()),
        proxy: Some(ProxyCache::new(origin, stale_read_through)),
    });
    let server = TestServer::new(app(state.clone())).expect("should create test server");
    TestSetup {
        temp_dir,
        state,
        server,
    }
}

/// Origin double replaying scripted responses and counting fetches.
#[derive(Default)]
pub struct ScriptedOrigin {
    responses: Mutex<HashMap<String, (StatusCode, Bytes)>>,
    pub fetches: AtomicUsize,
}

impl ScriptedOrigin {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, path: &str, status: StatusCode, body: &[u8]) {
        self.responses
            .lock()
            .expect("scripted origin lock")
            .insert(path.to_string(), (status, Bytes::copy_from_slice(body)));
    }

    /// Drop all scripted responses; subsequent fetches fail at transport level.
    pub fn go_dark(&self) {
        self.responses.lock().expect("scripted origin lock").clear();
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Origin for ScriptedOrigin {
    async fn fetch(&self, path: &str) -> AppResult<OriginResponse> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let scripted = self
            .responses
            .lock()
            .expect("scripted origin lock")
            .get(path)
            .cloned();
        match scripted {
            Some((status, body)) => Ok(OriginResponse {
                status,
                headers: HeaderMap::new(),
                body,
            }),
            None => Err(AppError::UpstreamUnavailable(format!(
                "no scripted response for {path}"
            ))),
        }
    }
}

/// A minimal but valid source distribution: gzipped tar with a PKG-INFO.
pub fn sdist_tar_gz(name: &str, version: &str) -> Vec<u8> {
    let record = format!("Metadata-Version: 1.0\nName: {name}\nVersion: {version}\n");
    let mut builder = tar::Builder::new(Vec::new());
    let mut header = tar::Header::new_gnu();
    header.set_size(record.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append_data(
            &mut header,
            format!("{name}-{version}/PKG-INFO"),
            record.as_bytes(),
        )
        .expect("should append PKG-INFO");
    let tar = builder.into_inner().expect("should finish tar");
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&tar).expect("should gzip");
    encoder.finish().expect("should finish gzip")
}

/// A minimal but valid wheel: zip with a dist-info METADATA record.
pub fn wheel(name: &str, version: &str) -> Vec<u8> {
    let record = format!("Metadata-Version: 2.1\nName: {name}\nVersion: {version}\n");
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    writer
        .start_file(format!("{name}-{version}.dist-info/METADATA"), options)
        .expect("should start METADATA");
    writer
        .write_all(record.as_bytes())
        .expect("should write METADATA");
    writer.finish().expect("should finish zip").into_inner()
}
