//! `modproxy.toml` configuration.
//!
//! Every field has a default, so an empty file (or no file at all) yields
//! a working configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level proxy configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Backing store settings.
    #[serde(default)]
    pub store: StoreConfig,
    /// Retry policy for transient store faults.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Archive size limits.
    #[serde(default)]
    pub archive: ArchiveLimits,
    /// Catalog behaviour.
    #[serde(default)]
    pub catalog: CatalogConfig,
}

/// Backing store section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Root directory of the filesystem store.
    #[serde(default = "default_store_root")]
    pub root: PathBuf,
}

fn default_store_root() -> PathBuf {
    PathBuf::from("goproxy")
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            root: default_store_root(),
        }
    }
}

/// Retry section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per store operation, including the first.
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    /// Base delay between attempts; attempt `n` waits `n * backoff_ms`.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    50
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            attempts: default_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_ms.saturating_mul(u64::from(attempt)))
    }
}

/// Limits the Go toolchain enforces on module archives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveLimits {
    /// Maximum size of the finished zip.
    #[serde(default = "default_max_archive_bytes")]
    pub max_archive_bytes: u64,
    /// Maximum size of `go.mod`.
    #[serde(default = "default_max_manifest_bytes")]
    pub max_manifest_bytes: u64,
    /// Maximum size of any single packaged file.
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

fn default_max_archive_bytes() -> u64 {
    500 << 20
}

fn default_max_manifest_bytes() -> u64 {
    16 << 20
}

fn default_max_file_bytes() -> u64 {
    500 << 20
}

impl Default for ArchiveLimits {
    fn default() -> Self {
        ArchiveLimits {
            max_archive_bytes: default_max_archive_bytes(),
            max_manifest_bytes: default_max_manifest_bytes(),
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

/// Catalog section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Let pre-releases win latest resolution.
    #[serde(default)]
    pub include_prerelease_in_latest: bool,
}

impl ProxyConfig {
    /// Parse and validate configuration from a TOML string.
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        let config: ProxyConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Reject values the engine cannot operate with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.attempts == 0 {
            return Err(ConfigError::Invalid {
                detail: "retry.attempts must be at least 1".to_string(),
            });
        }
        let limits = [
            ("archive.max_archive_bytes", self.archive.max_archive_bytes),
            ("archive.max_manifest_bytes", self.archive.max_manifest_bytes),
            ("archive.max_file_bytes", self.archive.max_file_bytes),
        ];
        for (name, value) in limits {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    detail: format!("{name} must be greater than zero"),
                });
            }
        }
        Ok(())
    }
}
