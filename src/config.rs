//! Store configuration
//!
//! Loaded from a JSON file. Every field has a default, so `{}` is a valid
//! configuration that stores under `./store`.
//!
//! ```json
//! {
//!   "store_dir": "/var/lib/txstore",
//!   "sync_writes": true,
//!   "sync_deletes": false,
//!   "journal": { "file_size": 2097152, "buffer_flushes_per_second": 100 }
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::observability::{log_event_with_fields, Event};

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Top-level store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding the journal segments (default: "./store")
    #[serde(default = "default_store_dir")]
    pub store_dir: PathBuf,

    /// fsync every add/update before returning (default: true)
    #[serde(default = "default_true")]
    pub sync_writes: bool,

    /// fsync every delete before returning (default: true)
    #[serde(default = "default_true")]
    pub sync_deletes: bool,

    /// Settings handed to the journal unchanged
    #[serde(default)]
    pub journal: JournalConfig,
}

/// Journal tuning. The store never interprets these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalConfig {
    /// Segment size that triggers rollover to a new file (default: 2 MiB)
    #[serde(default = "default_file_size")]
    pub file_size: u64,

    /// Write buffer capacity in bytes (default: 490 KiB)
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Segment file name prefix (default: "journal")
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,

    /// Segment file extension, without the dot (default: "txlog")
    #[serde(default = "default_file_extension")]
    pub file_extension: String,

    /// How often per second unsynced frames are pushed from the write
    /// buffer to the file; 0 leaves them buffered until a synced write,
    /// a full buffer or stop (default: 500)
    #[serde(default = "default_buffer_flushes_per_second")]
    pub buffer_flushes_per_second: u32,

    /// Writes the journal may have in flight at once (default: 1)
    #[serde(default = "default_max_io")]
    pub max_io: u32,
}

fn default_store_dir() -> PathBuf {
    PathBuf::from("./store")
}

fn default_true() -> bool {
    true
}

fn default_file_size() -> u64 {
    2 * 1024 * 1024
}

fn default_buffer_size() -> usize {
    490 * 1024
}

fn default_file_prefix() -> String {
    "journal".to_string()
}

fn default_file_extension() -> String {
    "txlog".to_string()
}

fn default_buffer_flushes_per_second() -> u32 {
    500
}

fn default_max_io() -> u32 {
    1
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            file_size: default_file_size(),
            buffer_size: default_buffer_size(),
            file_prefix: default_file_prefix(),
            file_extension: default_file_extension(),
            buffer_flushes_per_second: default_buffer_flushes_per_second(),
            max_io: default_max_io(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_dir: default_store_dir(),
            sync_writes: true,
            sync_deletes: true,
            journal: JournalConfig::default(),
        }
    }
}

impl StoreConfig {
    /// Default configuration rooted at `store_dir`.
    pub fn with_store_dir(store_dir: impl Into<PathBuf>) -> Self {
        Self {
            store_dir: store_dir.into(),
            ..Default::default()
        }
    }

    /// Load and validate configuration from a JSON file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: StoreConfig = serde_json::from_str(&content)?;
        config.validate()?;

        let config_path = path.display().to_string();
        let store_dir = config.store_dir.display().to_string();
        log_event_with_fields(
            Event::ConfigLoaded,
            &[("config", config_path.as_str()), ("store_dir", store_dir.as_str())],
        );
        Ok(config)
    }

    /// Reject settings the journal cannot work with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.store_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("store_dir must not be empty".into()));
        }
        self.journal.validate()
    }
}

impl JournalConfig {
    /// Period of the timed buffer flush, `None` when disabled.
    pub fn buffer_flush_interval(&self) -> Option<Duration> {
        match self.buffer_flushes_per_second {
            0 => None,
            n => Some(Duration::from_nanos(1_000_000_000 / u64::from(n))),
        }
    }

    /// Reject zero sizes and unusable file names.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.file_size == 0 {
            return Err(ConfigError::Invalid("journal.file_size must be > 0".into()));
        }
        if self.buffer_size == 0 {
            return Err(ConfigError::Invalid("journal.buffer_size must be > 0".into()));
        }
        if self.file_prefix.is_empty() || self.file_prefix.contains(|c: char| c == '/' || c == '\\') {
            return Err(ConfigError::Invalid(format!(
                "journal.file_prefix '{}' is not a usable file name prefix",
                self.file_prefix
            )));
        }
        if self.file_extension.is_empty() || self.file_extension.contains(|c: char| c == '.' || c == '/' || c == '\\') {
            return Err(ConfigError::Invalid(format!(
                "journal.file_extension '{}' must be non-empty and contain no dots or separators",
                self.file_extension
            )));
        }
        if self.max_io == 0 {
            return Err(ConfigError::Invalid("journal.max_io must be > 0".into()));
        }
        Ok(())
    }
}
