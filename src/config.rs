//! Configuration for depotkv
//!
//! Centralized configuration with sensible defaults.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

/// Bucket count used when no size hint is given
pub const DEFAULT_BUCKETS: u32 = 8191;

/// Upper bound on the bucket table (512 MiB of head pointers)
pub const MAX_BUCKETS: u32 = 1 << 26;

/// Main configuration for a depot handle
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // File Configuration
    // -------------------------------------------------------------------------
    /// Path of the single database file
    pub path: PathBuf,

    /// How the file is opened
    pub mode: OpenMode,

    /// Estimated number of buckets; only consulted when a file is created
    pub bucket_hint: Option<u32>,

    // -------------------------------------------------------------------------
    // Durability Configuration
    // -------------------------------------------------------------------------
    /// When to fsync
    pub sync_strategy: SyncStrategy,

    // -------------------------------------------------------------------------
    // Locking Configuration
    // -------------------------------------------------------------------------
    /// Take an advisory lock on the file (shared for readers, exclusive for
    /// writers). Off by default: cross-process exclusion is the caller's job.
    pub lock_file: bool,
}

/// Open mode of a depot file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Read only; the file must exist
    ReadOnly,

    /// Read / write; the file must exist
    ReadWrite,

    /// Read / write; create the file if it does not exist
    CreateIfMissing,

    /// Read / write; always start from an empty file
    CreateTruncate,
}

impl OpenMode {
    pub fn is_writable(self) -> bool {
        !matches!(self, OpenMode::ReadOnly)
    }

    pub fn creates(self) -> bool {
        matches!(self, OpenMode::CreateIfMissing | OpenMode::CreateTruncate)
    }

    pub fn truncates(self) -> bool {
        matches!(self, OpenMode::CreateTruncate)
    }

    /// Single-letter flag ("r", "w", "c", "n")
    pub fn flag(self) -> &'static str {
        match self {
            OpenMode::ReadOnly => "r",
            OpenMode::ReadWrite => "w",
            OpenMode::CreateIfMissing => "c",
            OpenMode::CreateTruncate => "n",
        }
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.flag())
    }
}

/// Error returned when an open-mode flag cannot be parsed
#[derive(Debug, Clone, Error)]
#[error("open mode should be 'r', 'w', 'c', or 'n', got {0:?}")]
pub struct ParseModeError(String);

impl FromStr for OpenMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "r" | "read-only" => Ok(OpenMode::ReadOnly),
            "w" | "read-write" => Ok(OpenMode::ReadWrite),
            "c" | "create" => Ok(OpenMode::CreateIfMissing),
            "n" | "new" | "truncate" => Ok(OpenMode::CreateTruncate),
            other => Err(ParseModeError(other.to_string())),
        }
    }
}

/// Sync strategy: how often to fsync the data file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fsync only on explicit sync and on close
    OnClose,

    /// fsync after every mutation (safest, slowest)
    EveryWrite,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./depot.db"),
            mode: OpenMode::CreateIfMissing,
            bucket_hint: None,
            sync_strategy: SyncStrategy::OnClose,
            lock_file: false,
        }
    }
}

impl Config {
    /// Create a config for `path` opened with `mode`
    pub fn new(path: impl Into<PathBuf>, mode: OpenMode) -> Self {
        Self {
            path: path.into(),
            mode,
            ..Self::default()
        }
    }

    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Bucket count a newly created file gets
    pub fn bucket_count(&self) -> u32 {
        match self.bucket_hint {
            None | Some(0) => DEFAULT_BUCKETS,
            Some(n) => n.min(MAX_BUCKETS),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the database file path
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.path = path.into();
        self
    }

    /// Set the open mode
    pub fn mode(mut self, mode: OpenMode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Set the estimated bucket count (0 selects the default)
    pub fn bucket_hint(mut self, buckets: u32) -> Self {
        self.config.bucket_hint = Some(buckets);
        self
    }

    /// Set the sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Enable or disable the advisory file lock
    pub fn lock_file(mut self, enabled: bool) -> Self {
        self.config.lock_file = enabled;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
