//! Test Helper Utilities
//!
//! Shared utilities for testing tunely-proxy: a scripted search provider,
//! fake extraction tools, and process liveness checks.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use http_body_util::BodyExt;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tower::ServiceExt;

use tunely_proxy::config::ExtractorConfig;
use tunely_proxy::services::normalizer::{TrackNormalizer, DEFAULT_THUMBNAIL_TEMPLATE};
use tunely_proxy::services::relevance_filter::RelevancePolicy;
use tunely_proxy::services::search_provider::{ProviderError, RawResult, SearchProvider};
use tunely_proxy::services::search_service::SearchService;
use tunely_proxy::services::stream_session::StreamManager;
use tunely_proxy::{build_router, AppState};

pub const TEST_BASE_URL: &str = "http://localhost:3000";

/// Endless audio-like output
pub const ENDLESS_SCRIPT: &str = "exec yes tunely-audio-chunk";

/// Short MP3-tagged output followed by a clean exit
pub const FINITE_SCRIPT: &str = "printf 'ID3-tunely-audio'\nexit 0";

/// Diagnostic output and failure before any audio
pub const FAILING_SCRIPT: &str = "echo 'ERROR: [youtube] Video unavailable' >&2\nexit 1";

/// Some audio, then failure
pub const TRUNCATING_SCRIPT: &str = "printf 'partial-audio'\nsleep 0.1\nexit 3";

/// Never produces output
pub const SILENT_SCRIPT: &str = "exec sleep 5";

/// Search provider returning canned results
pub struct StubProvider {
    results: Vec<RawResult>,
    fail: bool,
    pub calls: AtomicUsize,
}

impl StubProvider {
    pub fn with_results(results: Vec<RawResult>) -> Arc<Self> {
        Arc::new(Self {
            results,
            fail: false,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            results: Vec::new(),
            fail: true,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchProvider for StubProvider {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn search(&self, _query: &str, limit: usize) -> Result<Vec<RawResult>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ProviderError::Status(502, "bad gateway".to_string()));
        }
        Ok(self.results.iter().take(limit).cloned().collect())
    }

    async fn lookup(&self, id: &str) -> Result<Option<RawResult>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ProviderError::Network("connection reset".to_string()));
        }
        Ok(self.results.iter().find(|r| r.id == id).cloned())
    }
}

/// Ten results for "arijit singh": three carry "official", seven carry no
/// acceptance keyword at all
pub fn arijit_singh_results() -> Vec<RawResult> {
    let mut results = vec![
        RawResult::new("as01")
            .with_title("Tum Hi Ho (Official Video)")
            .with_author("T-Series")
            .with_timestamp("4:22")
            .with_views(1_000_000),
        RawResult::new("as02")
            .with_title("Channa Mereya Official")
            .with_author("Sony")
            .with_timestamp("4:49"),
        RawResult::new("as03")
            .with_title("Kesariya - Official")
            .with_author("Sony")
            .with_timestamp("2:48"),
    ];
    results.extend((4..=10).map(|i| {
        RawResult::new(format!("as{:02}", i))
            .with_title(format!("Arijit Singh live {}", i))
            .with_author("Fan Uploads")
    }));
    results
}

/// Write a fake extraction tool script run through `/bin/sh`
pub fn write_script(dir: &TempDir, name: &str, body: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    path
}

/// Extractor configuration running `script` as the extraction tool
pub fn extractor_config(script: &Path) -> ExtractorConfig {
    ExtractorConfig {
        program: PathBuf::from("/bin/sh"),
        program_args: vec![script.display().to_string()],
        first_byte_timeout_ms: 5_000,
        max_concurrent_streams: 4,
        chunk_size: 4096,
        ..ExtractorConfig::default()
    }
}

/// Extractor configuration pointing at a binary that does not exist
pub fn missing_extractor_config() -> ExtractorConfig {
    ExtractorConfig {
        program: PathBuf::from("/nonexistent/tunely-test-extractor"),
        ..ExtractorConfig::default()
    }
}

pub fn test_search_service(provider: Arc<dyn SearchProvider>) -> SearchService {
    SearchService::new(
        provider,
        RelevancePolicy::default(),
        TrackNormalizer::new(TEST_BASE_URL, DEFAULT_THUMBNAIL_TEMPLATE),
    )
}

pub fn test_state(provider: Arc<dyn SearchProvider>, extractor: ExtractorConfig) -> AppState {
    AppState::new(test_search_service(provider), StreamManager::new(extractor))
}

/// Send one request through a fresh router
pub async fn send(state: AppState, request: Request<Body>) -> Response<Body> {
    build_router(state).oneshot(request).await.unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("origin", "http://player.local")
        .body(Body::empty())
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// True when the process has exited (no /proc entry, or a zombie)
pub fn process_gone(pid: u32) -> bool {
    let Ok(stat) = std::fs::read_to_string(format!("/proc/{}/stat", pid)) else {
        return true;
    };
    // Format: "<pid> (<comm>) <state> ..."; comm may contain spaces
    stat.rsplit_once(')')
        .and_then(|(_, rest)| rest.trim_start().chars().next())
        .map(|state| state == 'Z' || state == 'X')
        .unwrap_or(true)
}

/// Poll until the process is gone or `timeout` elapses
pub async fn wait_until_gone(pid: u32, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if process_gone(pid) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    process_gone(pid)
}
