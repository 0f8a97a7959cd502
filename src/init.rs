// Process initialization
//
// Logging/tracing setup and the object store behind the writer pool

use gbfs2parquet_config::{LogConfig, LogFormat, RuntimeConfig, StorageBackend, StorageConfig};
use gbfs2parquet_writer::{OpenDalStore, PoolOptions, WriterPool};
use std::sync::Arc;
use tracing::info;

use crate::error::PipelineError;

/// Build the writer pool and its storage from RuntimeConfig
pub fn init_writer(config: &RuntimeConfig) -> Result<WriterPool, PipelineError> {
    let store = OpenDalStore::from_config(&config.storage).map_err(PipelineError::storage)?;
    let options = PoolOptions::from_config(config);
    info!(
        backend = %config.storage.backend,
        location = %storage_location(&config.storage),
        max_concurrent_writes = options.max_concurrent_writes,
        write_timeout_ms = options.write_timeout.as_millis() as u64,
        dataset = %config.writer.dataset,
        "Writer pool ready"
    );

    Ok(WriterPool::new(Arc::new(store), options))
}

/// Where the configured backend puts objects, for log fields.
fn storage_location(storage: &StorageConfig) -> String {
    let location = match storage.backend {
        StorageBackend::Fs => storage.fs.as_ref().map(|fs| fs.path.clone()),
        StorageBackend::S3 => storage
            .s3
            .as_ref()
            .map(|s3| format!("s3://{} ({})", s3.bucket, s3.region)),
        StorageBackend::R2 => storage
            .r2
            .as_ref()
            .map(|r2| format!("r2://{}/{}", r2.account_id, r2.bucket)),
    };
    location.unwrap_or_else(|| "unconfigured".to_string())
}

/// Initialize tracing/logging from LogConfig
pub fn init_tracing(config: &LogConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter =
        EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    // Try to set the global subscriber; ignore error if already set (idempotent)
    let _ = match config.log_format {
        LogFormat::Json => {
            tracing::subscriber::set_global_default(registry.with(fmt::layer().json()))
        }
        LogFormat::Text => tracing::subscriber::set_global_default(
            registry.with(fmt::layer().with_writer(std::io::stderr)),
        ),
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use gbfs2parquet_config::FsConfig;

    #[test]
    fn builds_pool_for_fs_backend() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RuntimeConfig::default();
        config.storage.fs = Some(FsConfig {
            path: dir.path().display().to_string(),
        });
        config.writer.max_concurrent_writes = Some(6);

        let pool = init_writer(&config).unwrap();
        assert_eq!(pool.max_concurrent_writes(), 6);
    }

    #[test]
    fn location_names_the_backend_target() {
        let mut config = RuntimeConfig::default();
        config.storage.fs = Some(FsConfig {
            path: "/data/gbfs".to_string(),
        });
        assert_eq!(storage_location(&config.storage), "/data/gbfs");

        config.storage.backend = StorageBackend::S3;
        config.storage.s3 = None;
        assert_eq!(storage_location(&config.storage), "unconfigured");
    }

    #[test]
    fn missing_storage_section_is_a_storage_error() {
        let mut config = RuntimeConfig::default();
        config.storage.backend = StorageBackend::S3;
        config.storage.s3 = None;

        let err = init_writer(&config).err().unwrap();
        assert!(matches!(err, PipelineError::Storage { .. }));
        assert_eq!(err.code(), "E105");
    }
}
