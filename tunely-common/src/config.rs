//! Configuration file resolution and loading
//!
//! Each service reads a single TOML file. The file location is resolved in
//! priority order:
//! 1. Explicit path (command-line argument)
//! 2. `TUNELY_CONFIG` environment variable
//! 3. User config directory (`~/.config/tunely/<module>.toml`)
//! 4. System config directory (`/etc/tunely/<module>.toml`, unix only)
//!
//! A missing file is not an error: the service starts on compiled defaults
//! and logs a warning. A file that exists but cannot be read or parsed is
//! an error, since silently ignoring it hides operator mistakes.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "TUNELY_CONFIG";

/// Directory name used under the user/system config roots
const CONFIG_DIR_NAME: &str = "tunely";

/// Logging configuration
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error,
    /// or a full `EnvFilter` string). `RUST_LOG` takes precedence.
    pub level: String,

    /// Log file path (optional, logs to stdout if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Where a loaded configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Parsed from this file
    File(PathBuf),
    /// A path was resolved but no file exists there; defaults used
    Missing(PathBuf),
    /// No candidate path at all; defaults used
    Defaults,
}

/// Result of loading a configuration file
#[derive(Debug, Clone)]
pub struct LoadedConfig<T> {
    pub config: T,
    pub source: ConfigSource,
}

/// Resolves the config file path for one module
#[derive(Debug, Clone)]
pub struct ConfigFileResolver {
    module_name: String,
}

impl ConfigFileResolver {
    /// Create a resolver for `module_name` (e.g. "tunely-proxy")
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
        }
    }

    /// File name looked up in the config directories
    pub fn file_name(&self) -> String {
        format!("{}.toml", self.module_name)
    }

    /// Resolve the config file path.
    ///
    /// Explicit and environment paths are returned even when the file does
    /// not exist, so the caller can report the miss. Directory candidates
    /// are only returned when the file is present.
    pub fn resolve(&self, explicit: Option<&Path>) -> Option<PathBuf> {
        // Priority 1: Command-line argument
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        // Priority 3/4: user then system config directory
        self.candidate_paths().into_iter().find(|path| path.exists())
    }

    fn candidate_paths(&self) -> Vec<PathBuf> {
        let mut candidates = Vec::new();

        if let Some(dir) = dirs::config_dir() {
            candidates.push(dir.join(CONFIG_DIR_NAME).join(self.file_name()));
        }

        if cfg!(unix) {
            candidates.push(
                PathBuf::from("/etc")
                    .join(CONFIG_DIR_NAME)
                    .join(self.file_name()),
            );
        }

        candidates
    }
}

/// Load a TOML configuration, falling back to `T::default()` when no file exists
pub fn load_toml_config<T>(path: Option<&Path>) -> Result<LoadedConfig<T>>
where
    T: DeserializeOwned + Default,
{
    let Some(path) = path else {
        return Ok(LoadedConfig {
            config: T::default(),
            source: ConfigSource::Defaults,
        });
    };

    if !path.exists() {
        return Ok(LoadedConfig {
            config: T::default(),
            source: ConfigSource::Missing(path.to_path_buf()),
        });
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;

    let config = parse_toml_config(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    Ok(LoadedConfig {
        config,
        source: ConfigSource::File(path.to_path_buf()),
    })
}

/// Parse TOML text into a configuration struct
pub fn parse_toml_config<T: DeserializeOwned>(content: &str) -> Result<T> {
    toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
}
