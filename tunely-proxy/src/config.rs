//! Configuration for tunely-proxy
//!
//! Settings sources priority:
//! 1. Command-line arguments (each also readable from a `TUNELY_*` env var)
//! 2. TOML configuration file (see `tunely_common::config` for lookup order)
//! 3. Built-in defaults (code constants below)
//!
//! Every section and every field is optional in the TOML file.

use serde::Deserialize;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tunely_common::config::LoggingConfig;

use crate::services::normalizer::{DEFAULT_THUMBNAIL_TEMPLATE, ID_PLACEHOLDER};
use crate::services::relevance_filter::RelevancePolicy;

/// Module name used for the config file (`tunely-proxy.toml`)
pub const MODULE_NAME: &str = "tunely-proxy";

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_SEARCH_TIMEOUT_SECS: u64 = 15;
const DEFAULT_INVIDIOUS_BASE_URL: &str = "https://yewtu.be";
const DEFAULT_EXTRACTOR_PROGRAM: &str = "yt-dlp";
const DEFAULT_AUDIO_FORMAT: &str = "bestaudio[ext=m4a]/bestaudio/best";
const DEFAULT_SOURCE_URL_TEMPLATE: &str = "https://www.youtube.com/watch?v={id}";
const DEFAULT_FIRST_BYTE_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_MAX_CONCURRENT_STREAMS: usize = 32;
const DEFAULT_CONTENT_TYPE: &str = "audio/mp4";
const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Complete service configuration (one struct per TOML section)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub search: SearchConfig,
    pub extractor: ExtractorConfig,
    pub relevance: RelevancePolicy,
}

/// `[server]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,

    pub port: u16,

    /// Externally reachable root used to build stream URLs.
    /// Defaults to `http://localhost:{port}`.
    pub public_base_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            public_base_url: None,
        }
    }
}

impl ServerConfig {
    pub fn public_base_url(&self) -> String {
        self.public_base_url
            .clone()
            .unwrap_or_else(|| format!("http://localhost:{}", self.port))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Upstream search backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchProviderKind {
    /// The extraction tool's own search mode (`ytsearchN:<query>`)
    #[default]
    Ytdlp,
    /// Invidious-compatible JSON API
    Invidious,
}

impl FromStr for SearchProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ytdlp" | "yt-dlp" => Ok(Self::Ytdlp),
            "invidious" => Ok(Self::Invidious),
            other => Err(format!(
                "unknown search provider '{}' (expected 'ytdlp' or 'invidious')",
                other
            )),
        }
    }
}

/// `[search]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub provider: SearchProviderKind,

    /// Root of the Invidious-compatible API (used when provider = "invidious")
    pub invidious_base_url: String,

    /// Upper bound on one upstream search or lookup
    pub timeout_secs: u64,

    /// Thumbnail URL used when upstream omits one; `{id}` is replaced
    pub thumbnail_template: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: SearchProviderKind::default(),
            invidious_base_url: DEFAULT_INVIDIOUS_BASE_URL.to_string(),
            timeout_secs: DEFAULT_SEARCH_TIMEOUT_SECS,
            thumbnail_template: DEFAULT_THUMBNAIL_TEMPLATE.to_string(),
        }
    }
}

impl SearchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// `[extractor]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Extraction tool executable (name on PATH or absolute path)
    pub program: PathBuf,

    /// Arguments placed before all others, e.g. `["-m", "yt_dlp"]` when
    /// `program` is a Python interpreter
    pub program_args: Vec<String>,

    /// Format selector passed with `-f`
    pub format: String,

    /// Media source locator; `{id}` is replaced by the track id
    pub source_url_template: String,

    /// Extra arguments appended before the source URL
    pub extra_args: Vec<String>,

    /// Kill the extractor if it produces no audio within this window
    pub first_byte_timeout_ms: u64,

    /// Cap on simultaneously running extraction subprocesses (0 = no cap)
    pub max_concurrent_streams: usize,

    /// Content-Type used when the container cannot be sniffed
    pub default_content_type: String,

    /// Read size for subprocess output
    pub chunk_size: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_EXTRACTOR_PROGRAM),
            program_args: Vec::new(),
            format: DEFAULT_AUDIO_FORMAT.to_string(),
            source_url_template: DEFAULT_SOURCE_URL_TEMPLATE.to_string(),
            extra_args: Vec::new(),
            first_byte_timeout_ms: DEFAULT_FIRST_BYTE_TIMEOUT_MS,
            max_concurrent_streams: DEFAULT_MAX_CONCURRENT_STREAMS,
            default_content_type: DEFAULT_CONTENT_TYPE.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ExtractorConfig {
    /// Media source locator handed to the extraction tool
    pub fn source_url(&self, id: &str) -> String {
        self.source_url_template.replace(ID_PLACEHOLDER, id)
    }

    pub fn first_byte_timeout(&self) -> Duration {
        Duration::from_millis(self.first_byte_timeout_ms)
    }

    /// Display name of the tool for logs and client messages
    pub fn program_name(&self) -> String {
        self.program.display().to_string()
    }
}
