//! # Configuration Management
//!
//! Configuration for the repository adapter: network settings, the data
//! directory backing [`crate::storage::FsStorage`], upstream (pull-through)
//! settings, and request limits. All sections serialize to JSON and fall
//! back to sensible defaults.
//!
//! ```rust,no_run
//! # use pypi_depot::config::Config;
//! // Load from file with fallback to defaults
//! let config = Config::load_or_default("config.json");
//!
//! // Use built-in defaults
//! let config = Config::default();
//! ```

use crate::error::AppResult;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Main configuration structure for the repository adapter.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Server configuration (host, port)
    #[serde(default)]
    pub server: ServerConfig,
    /// Storage location for the backing store
    #[serde(default)]
    pub storage: StorageConfig,
    /// Upstream index used in pull-through mode
    #[serde(default)]
    pub upstream: UpstreamConfig,
    /// Upload and request limits
    #[serde(default)]
    pub limits: LimitsConfig,
}

/// Server configuration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host/IP address to bind to (e.g., "0.0.0.0" or "localhost")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Storage configuration for the backing store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Base directory holding all stored artifacts and cached objects
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
        }
    }
}

/// Configuration for the upstream package index.
///
/// When `enabled` is set the server runs as a caching pull-through mirror:
/// every GET is resolved against the upstream and successful responses are
/// persisted in the backing store. `stale_read_through` controls what a
/// failed upstream fetch does when a cached copy exists: serve the cached
/// copy (`true`) or forward the upstream's failing status (`false`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Whether pull-through mirroring is enabled
    pub enabled: bool,
    /// Base URL of the upstream index (e.g., "https://pypi.org")
    pub url: String,
    /// HTTP request timeout for upstream calls, in seconds
    pub timeout_secs: u64,
    /// Serve a previously cached value when the upstream fetch fails
    pub stale_read_through: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: "https://pypi.org".to_string(),
            timeout_secs: 30,
            stale_read_through: false,
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Upload and request limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum buffered request body size in bytes. Multipart decoding
    /// materializes the whole body, so this bounds upload memory use.
    pub max_upload_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: 256 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: Config = serde_json::from_str(&content)?;
        debug!(path = %path.as_ref().display(), "Loaded configuration");
        Ok(config)
    }

    /// Load configuration from a JSON file, falling back to defaults when
    /// the file is missing or unreadable.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(&path) {
            Ok(config) => config,
            Err(err) => {
                warn!(path = %path.as_ref().display(), error = %err, "Using default configuration");
                Config::default()
            }
        }
    }
}
