// gbfs2parquet-config - Unified configuration for backfill runs
//
// Supports configuration from multiple sources:
// 1. Environment variables (highest priority)
// 2. Config file path from GBFS2PARQUET_CONFIG env var (or --config)
// 3. Config file contents from GBFS2PARQUET_CONFIG_CONTENT env var
// 4. Default config file locations (./config.toml, ./.gbfs2parquet.toml)
// 5. Built-in defaults (lowest priority)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

mod env_overrides;
mod sources;
mod validation;

pub use env_overrides::{EnvSource, ENV_PREFIX};

/// Main runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub writer: WriterConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LogConfig,

    #[serde(default)]
    pub backfill: BackfillConfig,
}

/// How the delimited source is read
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Single-byte field delimiter
    pub delimiter: String,
    /// Maximum records per batch
    pub chunk_rows: usize,
}

impl SourceConfig {
    /// Delimiter as a byte. Validation guarantees a single ASCII character.
    pub fn delimiter_byte(&self) -> u8 {
        self.delimiter.as_bytes().first().copied().unwrap_or(b'|')
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            delimiter: "|".to_string(),
            chunk_rows: 1_000_000,
        }
    }
}

/// Partitioned writer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Concurrent in-flight writes; defaults to host parallelism
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrent_writes: Option<usize>,
    pub write_timeout_secs: u64,
    /// Top-level dataset directory, e.g. "station_status"
    pub dataset: String,
    /// Leading component of every object name
    pub file_prefix: String,
    pub row_group_size: usize,
}

impl WriterConfig {
    pub fn resolved_concurrency(&self) -> usize {
        self.max_concurrent_writes
            .unwrap_or_else(default_concurrency)
            .max(1)
    }
}

/// Host parallelism, never fewer than four writers since writes are I/O-bound.
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .max(4)
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            max_concurrent_writes: None,
            write_timeout_secs: 60,
            dataset: "station_status".to_string(),
            file_prefix: "gbfs2parquet-1".to_string(),
            row_group_size: 32 * 1024,
        }
    }
}

/// Storage backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fs: Option<FsConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3: Option<S3Config>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r2: Option<R2Config>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Fs,
            fs: Some(FsConfig::default()),
            s3: None,
            r2: None,
        }
    }
}

impl StorageConfig {
    /// Configured object key prefix (always ends with "/" when present).
    pub fn prefix(&self) -> Option<&str> {
        match self.backend {
            StorageBackend::Fs => None,
            StorageBackend::S3 => self.s3.as_ref().and_then(|s3| s3.prefix.as_deref()),
            StorageBackend::R2 => self.r2.as_ref().and_then(|r2| r2.prefix.as_deref()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Fs,
    S3,
    R2,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::Fs => write!(f, "fs"),
            StorageBackend::S3 => write!(f, "s3"),
            StorageBackend::R2 => write!(f, "r2"),
        }
    }
}

impl std::str::FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "fs" | "filesystem" => Ok(StorageBackend::Fs),
            "s3" | "aws" => Ok(StorageBackend::S3),
            "r2" => Ok(StorageBackend::R2),
            _ => anyhow::bail!("Unsupported storage backend: {}. Supported: fs, s3, r2", s),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsConfig {
    pub path: String,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            path: "./data".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Optional path prefix for all stored files (e.g., "backfill-2019/")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct R2Config {
    pub bucket: String,
    pub account_id: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

/// Backfill run parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackfillConfig {
    /// Exclusive upper bound on execution_time; rows at or after it belong
    /// to the live ingestion path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cutoff: Option<String>,
}

impl RuntimeConfig {
    /// Load configuration from a specific file path (for CLI usage).
    pub fn load_from_path(path: impl AsRef<std::path::Path>) -> Result<Self> {
        sources::load_from_file_path(path)
    }

    /// Load configuration with graceful fallback to defaults.
    /// Does not fail if config file is missing.
    pub fn load_or_default() -> Result<Self> {
        sources::load_or_default()
    }

    /// Merge another config into this one (used for TOML layering).
    pub fn merge(&mut self, other: RuntimeConfig) {
        self.source = other.source;
        self.writer = other.writer;
        self.storage = other.storage;
        self.logging = other.logging;

        if other.backfill.cutoff.is_some() {
            self.backfill = other.backfill;
        }
    }

    /// Apply environment overrides from a custom source.
    pub fn apply_env_overrides_from<E: EnvSource>(&mut self, env: &E) -> Result<()> {
        env_overrides::apply_env_overrides(self, env)
    }

    /// Build a configuration from inline TOML plus overrides supplied by an
    /// `EnvSource`. Used by tests and embedders that do not read files.
    pub fn load_with_env<E: EnvSource>(inline_config: Option<&str>, env: &E) -> Result<Self> {
        let mut config = RuntimeConfig::default();

        if let Some(inline) = inline_config {
            let file_config: RuntimeConfig =
                toml::from_str(inline).context("Failed to parse inline config content")?;
            config.merge(file_config);
        }

        config.apply_env_overrides_from(env)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}
