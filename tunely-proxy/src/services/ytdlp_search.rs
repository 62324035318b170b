//! Search provider backed by the extraction tool's own search mode
//!
//! Runs `yt-dlp --flat-playlist --dump-json "ytsearchN:<query>"` and parses
//! one JSON object per output line. Lookup uses `--dump-json --skip-download`
//! against the single-item source URL.

use async_trait::async_trait;
use serde::Deserialize;
use std::io;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};
use tunely_common::human_time::format_timestamp;

use crate::config::ExtractorConfig;
use crate::services::search_provider::{ProviderError, RawResult, SearchProvider};

/// Trailing diagnostic output kept in error messages
const STDERR_TAIL_CHARS: usize = 300;

/// Subset of one `--dump-json` record
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct YtDlpEntry {
    id: String,
    title: Option<String>,
    channel: Option<String>,
    uploader: Option<String>,
    /// Seconds, reported as a float
    duration: Option<f64>,
    duration_string: Option<String>,
    view_count: Option<u64>,
    thumbnail: Option<String>,
    thumbnails: Vec<YtDlpThumbnail>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct YtDlpThumbnail {
    url: String,
}

impl YtDlpEntry {
    fn into_raw(self) -> RawResult {
        let timestamp = self.duration_string.filter(|s| !s.is_empty()).or_else(|| {
            self.duration
                .filter(|d| d.is_finite() && *d >= 0.0)
                .map(|d| format_timestamp(d.round() as u64))
        });

        // Thumbnails are listed smallest first
        let thumbnail = self
            .thumbnail
            .or_else(|| self.thumbnails.into_iter().rev().map(|t| t.url).find(|u| !u.is_empty()));

        RawResult {
            id: self.id,
            title: self.title,
            author: self.channel.or(self.uploader),
            timestamp,
            thumbnail,
            views: self.view_count,
        }
    }
}

/// Parse newline-delimited `--dump-json` output.
///
/// Unparseable lines and records without an id are skipped.
pub fn parse_search_output(stdout: &str) -> Vec<RawResult> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| match serde_json::from_str::<YtDlpEntry>(line) {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!("Skipping unparseable search record: {}", e);
                None
            }
        })
        .filter(|entry| !entry.id.is_empty())
        .map(YtDlpEntry::into_raw)
        .collect()
}

/// Provider that shells out to the extraction tool
pub struct YtDlpSearchProvider {
    extractor: ExtractorConfig,
    timeout: Duration,
}

impl YtDlpSearchProvider {
    pub fn new(extractor: ExtractorConfig, timeout: Duration) -> Self {
        Self { extractor, timeout }
    }

    async fn run(&self, args: &[String]) -> Result<Output, ProviderError> {
        let mut command = Command::new(&self.extractor.program);
        command
            .args(&self.extractor.program_args)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(program = %self.extractor.program_name(), args = ?args, "Running search tool");

        match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) if e.kind() == io::ErrorKind::NotFound => {
                Err(ProviderError::ToolNotFound(self.extractor.program_name()))
            }
            Ok(Err(e)) => Err(ProviderError::Tool(format!(
                "failed to start {}: {}",
                self.extractor.program_name(),
                e
            ))),
            Err(_) => Err(ProviderError::Timeout(self.timeout)),
        }
    }
}

#[async_trait]
impl SearchProvider for YtDlpSearchProvider {
    fn name(&self) -> &'static str {
        "ytdlp"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<RawResult>, ProviderError> {
        let args = vec![
            "--flat-playlist".to_string(),
            "--dump-json".to_string(),
            "--no-warnings".to_string(),
            "--ignore-errors".to_string(),
            format!("ytsearch{}:{}", limit, query),
        ];

        let output = self.run(&args).await?;
        let mut results = parse_search_output(&String::from_utf8_lossy(&output.stdout));

        // --ignore-errors exits non-zero when any single entry failed
        if !output.status.success() {
            if results.is_empty() {
                return Err(ProviderError::Tool(stderr_tail(&output.stderr)));
            }
            warn!(
                status = %output.status,
                results = results.len(),
                "Search tool reported errors, keeping partial results"
            );
        }

        results.truncate(limit);
        Ok(results)
    }

    async fn lookup(&self, id: &str) -> Result<Option<RawResult>, ProviderError> {
        let args = vec![
            "--dump-json".to_string(),
            "--skip-download".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            self.extractor.source_url(id),
        ];

        let output = self.run(&args).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);

        if !output.status.success() {
            let tail = stderr_tail(&output.stderr);
            // The tool reports missing items as a plain failure
            if tail.contains("unavailable") || tail.contains("not exist") {
                return Ok(None);
            }
            return Err(ProviderError::Tool(tail));
        }

        Ok(parse_search_output(&stdout).into_iter().next())
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    let skip = text.chars().count().saturating_sub(STDERR_TAIL_CHARS);
    let tail: String = text.chars().skip(skip).collect();
    if tail.is_empty() {
        "search tool exited with an error".to_string()
    } else {
        tail
    }
}
