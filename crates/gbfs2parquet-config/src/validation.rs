// Configuration validation
//
// Validates that required fields are present and values are sensible

use super::*;
use anyhow::{bail, Result};
use tracing::warn;

pub fn validate_config(config: &RuntimeConfig) -> Result<()> {
    validate_source_config(&config.source)?;
    validate_writer_config(&config.writer)?;
    validate_storage_config(&config.storage)?;
    Ok(())
}

fn validate_source_config(config: &SourceConfig) -> Result<()> {
    if config.chunk_rows == 0 {
        bail!("source.chunk_rows must be greater than 0");
    }

    if config.delimiter.len() != 1 || !config.delimiter.is_ascii() {
        bail!(
            "source.delimiter must be a single ASCII character, got {:?}",
            config.delimiter
        );
    }

    if config.chunk_rows > 10_000_000 {
        warn!(
            chunk_rows = config.chunk_rows,
            "source.chunk_rows is very large; may cause memory issues"
        );
    }

    Ok(())
}

fn validate_writer_config(config: &WriterConfig) -> Result<()> {
    if config.max_concurrent_writes == Some(0) {
        bail!("writer.max_concurrent_writes must be greater than 0");
    }

    if config.write_timeout_secs == 0 {
        bail!("writer.write_timeout_secs must be greater than 0");
    }

    if config.row_group_size == 0 {
        bail!("writer.row_group_size must be greater than 0");
    }

    for (name, value) in [
        ("writer.dataset", &config.dataset),
        ("writer.file_prefix", &config.file_prefix),
    ] {
        if value.is_empty() {
            bail!("{} must not be empty", name);
        }
        if value.contains('/') {
            bail!("{} must not contain '/', got {:?}", name, value);
        }
    }

    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> Result<()> {
    match config.backend {
        StorageBackend::Fs => {
            let fs = config
                .fs
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("fs storage backend requires 'fs' configuration"))?;

            if fs.path.is_empty() {
                bail!(
                    "Filesystem path is required\n\n\
                    How to fix:\n\
                      • Environment: export {}STORAGE_PATH=/data/snapshots\n\
                      • TOML: [storage.fs]\n              path = \"/data/snapshots\"\n",
                    ENV_PREFIX
                );
            }
        }
        StorageBackend::S3 => {
            let s3 = config
                .s3
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("s3 storage backend requires 's3' configuration"))?;

            if s3.bucket.is_empty() {
                bail!(
                    "S3 bucket name is required\n\n\
                    How to fix:\n\
                      • Environment: export {}S3_BUCKET=my-bucket\n\
                      • TOML: [storage.s3]\n              bucket = \"my-bucket\"\n",
                    ENV_PREFIX
                );
            }

            if s3.region.is_empty() {
                bail!(
                    "S3 region is required\n\n\
                    How to fix:\n\
                      • Environment: export {}S3_REGION=us-east-1\n\
                      • TOML: [storage.s3]\n              region = \"us-east-1\"\n",
                    ENV_PREFIX
                );
            }
        }
        StorageBackend::R2 => {
            let r2 = config
                .r2
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("r2 storage backend requires 'r2' configuration"))?;

            if r2.bucket.is_empty() {
                bail!(
                    "R2 bucket name is required\n\n\
                    How to fix:\n\
                      • Environment: export {}R2_BUCKET=my-bucket\n",
                    ENV_PREFIX
                );
            }

            if r2.account_id.is_empty() {
                bail!(
                    "R2 account ID is required\n\n\
                    How to fix:\n\
                      • Environment: export {}R2_ACCOUNT_ID=<your-account-id>\n",
                    ENV_PREFIX
                );
            }

            if r2.access_key_id.is_empty() || r2.secret_access_key.is_empty() {
                bail!(
                    "R2 credentials are required\n\n\
                    How to fix:\n\
                      • Environment: export AWS_ACCESS_KEY_ID=<key> AWS_SECRET_ACCESS_KEY=<secret>\n"
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_source_config() {
        assert!(validate_source_config(&SourceConfig::default()).is_ok());

        let zero_rows = SourceConfig {
            chunk_rows: 0,
            ..SourceConfig::default()
        };
        assert!(validate_source_config(&zero_rows).is_err());

        let long_delimiter = SourceConfig {
            delimiter: "||".to_string(),
            ..SourceConfig::default()
        };
        assert!(validate_source_config(&long_delimiter).is_err());
    }

    #[test]
    fn test_validate_writer_config() {
        assert!(validate_writer_config(&WriterConfig::default()).is_ok());

        let zero_writers = WriterConfig {
            max_concurrent_writes: Some(0),
            ..WriterConfig::default()
        };
        assert!(validate_writer_config(&zero_writers).is_err());

        let nested_dataset = WriterConfig {
            dataset: "a/b".to_string(),
            ..WriterConfig::default()
        };
        assert!(validate_writer_config(&nested_dataset).is_err());
    }

    #[test]
    fn test_validate_storage_config() {
        let s3_config = StorageConfig {
            backend: StorageBackend::S3,
            fs: None,
            s3: Some(S3Config {
                bucket: "snapshots".to_string(),
                region: "us-east-1".to_string(),
                endpoint: None,
                prefix: None,
            }),
            r2: None,
        };
        assert!(validate_storage_config(&s3_config).is_ok());

        let invalid_s3 = StorageConfig {
            backend: StorageBackend::S3,
            fs: None,
            s3: Some(S3Config {
                bucket: String::new(),
                region: "us-east-1".to_string(),
                endpoint: None,
                prefix: None,
            }),
            r2: None,
        };
        assert!(validate_storage_config(&invalid_s3).is_err());

        let missing_section = StorageConfig {
            backend: StorageBackend::R2,
            fs: None,
            s3: None,
            r2: None,
        };
        assert!(validate_storage_config(&missing_section).is_err());
    }
}
