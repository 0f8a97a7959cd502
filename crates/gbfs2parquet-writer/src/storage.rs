//! Object storage for finished Parquet files.
//!
//! `ObjectStore` is the write-only seam the writer pool talks to. The OpenDAL
//! implementation covers local filesystem, S3 and R2; tests substitute an
//! in-memory operator or their own doubles.

use async_trait::async_trait;
use bytes::Bytes;
use gbfs2parquet_config::{StorageBackend, StorageConfig};
use opendal::Operator;

use crate::error::{Result, WriterError};

/// Write-only object storage
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `payload` at `path`, replacing nothing (paths are unique).
    async fn put(&self, path: &str, payload: Bytes) -> Result<()>;
}

/// OpenDAL-backed object store
#[derive(Clone)]
pub struct OpenDalStore {
    operator: Operator,
}

impl OpenDalStore {
    pub fn new(operator: Operator) -> Self {
        Self { operator }
    }

    /// Build a store for the configured backend.
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        build_operator(config).map(Self::new)
    }
}

#[async_trait]
impl ObjectStore for OpenDalStore {
    async fn put(&self, path: &str, payload: Bytes) -> Result<()> {
        self.operator.write(path, payload).await.map_err(|e| {
            WriterError::write_failure(format!("Failed to write '{}': {}", path, e))
        })?;
        Ok(())
    }
}

/// Create an OpenDAL operator from storage configuration.
pub fn build_operator(config: &StorageConfig) -> Result<Operator> {
    let operator = match config.backend {
        StorageBackend::Fs => {
            let fs = config.fs.as_ref().ok_or_else(|| {
                WriterError::invalid_config("fs config required for filesystem backend")
            })?;

            let fs_builder = opendal::services::Fs::default().root(&fs.path);
            Operator::new(fs_builder)
                .map_err(|e| {
                    WriterError::invalid_config(format!(
                        "Failed to create filesystem operator: {}",
                        e
                    ))
                })?
                .finish()
        }
        StorageBackend::S3 => {
            let s3 = config.s3.as_ref().ok_or_else(|| {
                WriterError::invalid_config("s3 config required for S3 backend")
            })?;

            let mut s3_builder = opendal::services::S3::default()
                .bucket(&s3.bucket)
                .region(&s3.region);

            if let Some(endpoint) = &s3.endpoint {
                s3_builder = s3_builder.endpoint(endpoint);
            }

            Operator::new(s3_builder)
                .map_err(|e| {
                    WriterError::invalid_config(format!("Failed to create S3 operator: {}", e))
                })?
                .finish()
        }
        StorageBackend::R2 => {
            let r2 = config.r2.as_ref().ok_or_else(|| {
                WriterError::invalid_config("r2 config required for R2 backend")
            })?;

            let endpoint = r2
                .endpoint
                .clone()
                .unwrap_or_else(|| format!("https://{}.r2.cloudflarestorage.com", r2.account_id));

            let r2_builder = opendal::services::S3::default()
                .bucket(&r2.bucket)
                .region("auto")
                .endpoint(&endpoint)
                .access_key_id(&r2.access_key_id)
                .secret_access_key(&r2.secret_access_key);

            Operator::new(r2_builder)
                .map_err(|e| {
                    WriterError::invalid_config(format!("Failed to create R2 operator: {}", e))
                })?
                .finish()
        }
    };

    tracing::debug!(backend = %config.backend, "Storage operator initialized");
    Ok(operator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gbfs2parquet_config::FsConfig;

    #[tokio::test]
    async fn memory_store_round_trips_payload() {
        let op = Operator::new(opendal::services::Memory::default())
            .unwrap()
            .finish();
        let store = OpenDalStore::new(op.clone());

        store
            .put("station_status/2019/08/01/09/a.parquet", Bytes::from_static(b"PAR1"))
            .await
            .unwrap();

        let data = op
            .read("station_status/2019/08/01/09/a.parquet")
            .await
            .unwrap();
        assert_eq!(data.to_vec(), b"PAR1");
    }

    #[test]
    fn fs_backend_requires_fs_section() {
        let config = StorageConfig {
            backend: StorageBackend::Fs,
            fs: None,
            s3: None,
            r2: None,
        };
        let err = build_operator(&config).err().unwrap();
        assert!(matches!(err, WriterError::InvalidConfig { .. }));
    }

    #[test]
    fn fs_backend_builds_operator() {
        let config = StorageConfig {
            backend: StorageBackend::Fs,
            fs: Some(FsConfig {
                path: std::env::temp_dir().display().to_string(),
            }),
            s3: None,
            r2: None,
        };
        assert!(OpenDalStore::from_config(&config).is_ok());
    }
}
