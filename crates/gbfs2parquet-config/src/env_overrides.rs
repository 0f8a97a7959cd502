use super::{FsConfig, LogFormat, R2Config, RuntimeConfig, S3Config, StorageBackend};
use anyhow::{anyhow, Context, Result};

pub const ENV_PREFIX: &str = "GBFS2PARQUET_";

/// Abstraction over environment-variable lookups so tests and embedders can
/// supply their own source of overrides.
pub trait EnvSource {
    /// Get a variable by its name without the GBFS2PARQUET_ prefix
    fn get(&self, key: &str) -> Option<String>;

    /// Get an environment variable WITHOUT the GBFS2PARQUET_ prefix
    /// Used for AWS standard variables (AWS_ACCESS_KEY_ID, etc.)
    fn get_raw(&self, key: &str) -> Option<String>;
}

/// Apply environment-variable overrides (highest priority) to the runtime config.
pub fn apply_env_overrides<E: EnvSource>(config: &mut RuntimeConfig, env: &E) -> Result<()> {
    // Source
    if let Some(delimiter) = get_env_string(env, "SOURCE_DELIMITER") {
        config.source.delimiter = delimiter;
    }
    if let Some(val) = get_env_usize(env, "SOURCE_CHUNK_ROWS")? {
        config.source.chunk_rows = val;
    }

    // Writer
    if let Some(val) = get_env_usize(env, "MAX_CONCURRENT_WRITES")? {
        config.writer.max_concurrent_writes = Some(val);
    }
    if let Some(val) = get_env_u64(env, "WRITE_TIMEOUT_SECS")? {
        config.writer.write_timeout_secs = val;
    }
    if let Some(dataset) = get_env_string(env, "DATASET") {
        config.writer.dataset = dataset;
    }
    if let Some(prefix) = get_env_string(env, "FILE_PREFIX") {
        config.writer.file_prefix = prefix;
    }
    if let Some(val) = get_env_usize(env, "ROW_GROUP_SIZE")? {
        config.writer.row_group_size = val;
    }

    // Logging
    if let Some(level) = get_env_string(env, "LOG_LEVEL") {
        config.logging.log_level = level;
    }
    if let Some(format) = get_env_string(env, "LOG_FORMAT") {
        config.logging.log_format = match format.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };
    }

    // Backfill
    if let Some(cutoff) = get_env_string(env, "CUTOFF") {
        config.backfill.cutoff = Some(cutoff);
    }

    // Storage backend
    if let Some(backend) = get_env_string(env, "STORAGE_BACKEND") {
        config.storage.backend = backend
            .parse::<StorageBackend>()
            .context("Invalid GBFS2PARQUET_STORAGE_BACKEND value")?;
    }

    // Filesystem storage
    if let Some(path) = get_env_string(env, "STORAGE_PATH") {
        config.storage.fs.get_or_insert_with(FsConfig::default).path = path;
    }

    // S3 storage
    if let Some(bucket) = get_env_string(env, "S3_BUCKET") {
        ensure_s3(config).bucket = bucket;
    }
    if let Some(region) = get_env_string(env, "S3_REGION") {
        ensure_s3(config).region = region;
    }
    if let Some(endpoint) = get_env_string(env, "S3_ENDPOINT") {
        ensure_s3(config).endpoint = Some(endpoint);
    }
    if let Some(prefix) = get_env_string(env, "S3_PREFIX") {
        ensure_s3(config).prefix = normalize_prefix(prefix);
    }

    // R2 storage
    if let Some(bucket) = get_env_string(env, "R2_BUCKET") {
        ensure_r2(config).bucket = bucket;
    }
    if let Some(account_id) = get_env_string(env, "R2_ACCOUNT_ID") {
        ensure_r2(config).account_id = account_id;
    }
    // AWS standard credentials (without GBFS2PARQUET_ prefix for compatibility)
    if config.storage.backend == StorageBackend::R2 {
        if let Some(access_key_id) = env.get_raw("AWS_ACCESS_KEY_ID") {
            ensure_r2(config).access_key_id = access_key_id;
        }
        if let Some(secret_access_key) = env.get_raw("AWS_SECRET_ACCESS_KEY") {
            ensure_r2(config).secret_access_key = secret_access_key;
        }
    }
    if let Some(prefix) = get_env_string(env, "R2_PREFIX") {
        ensure_r2(config).prefix = normalize_prefix(prefix);
    }

    Ok(())
}

fn ensure_s3(config: &mut RuntimeConfig) -> &mut S3Config {
    config.storage.s3.get_or_insert_with(|| S3Config {
        bucket: String::new(),
        region: String::new(),
        endpoint: None,
        prefix: None,
    })
}

fn ensure_r2(config: &mut RuntimeConfig) -> &mut R2Config {
    config.storage.r2.get_or_insert_with(|| R2Config {
        bucket: String::new(),
        account_id: String::new(),
        access_key_id: String::new(),
        secret_access_key: String::new(),
        endpoint: None,
        prefix: None,
    })
}

fn get_env_string<E: EnvSource>(env: &E, key: &str) -> Option<String> {
    env.get(key)
}

fn get_env_usize<E: EnvSource>(env: &E, key: &str) -> Result<Option<usize>> {
    match get_env_string(env, key) {
        Some(val) => {
            let parsed = val
                .parse::<usize>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

fn get_env_u64<E: EnvSource>(env: &E, key: &str) -> Result<Option<u64>> {
    match get_env_string(env, key) {
        Some(val) => {
            let parsed = val
                .parse::<u64>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

pub(crate) fn normalize_prefix(prefix: String) -> Option<String> {
    if prefix.is_empty() {
        None
    } else if prefix.ends_with('/') {
        Some(prefix)
    } else {
        Some(format!("{}/", prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MapEnv {
        prefixed: HashMap<&'static str, &'static str>,
        raw: HashMap<&'static str, &'static str>,
    }

    impl EnvSource for MapEnv {
        fn get(&self, key: &str) -> Option<String> {
            self.prefixed.get(key).map(|v| v.to_string())
        }

        fn get_raw(&self, key: &str) -> Option<String> {
            self.raw.get(key).map(|v| v.to_string())
        }
    }

    #[test]
    fn prefixes_gain_trailing_slash() {
        assert_eq!(normalize_prefix("a".into()), Some("a/".into()));
        assert_eq!(normalize_prefix("a/".into()), Some("a/".into()));
        assert_eq!(normalize_prefix(String::new()), None);
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let env = MapEnv {
            prefixed: HashMap::from([("SOURCE_CHUNK_ROWS", "lots")]),
            ..Default::default()
        };
        let mut config = RuntimeConfig::default();
        let err = apply_env_overrides(&mut config, &env).unwrap_err();
        assert!(err.to_string().contains("GBFS2PARQUET_SOURCE_CHUNK_ROWS"));
    }

    #[test]
    fn r2_credentials_come_from_standard_aws_variables() {
        let env = MapEnv {
            prefixed: HashMap::from([
                ("STORAGE_BACKEND", "r2"),
                ("R2_BUCKET", "snapshots"),
                ("R2_ACCOUNT_ID", "acct"),
            ]),
            raw: HashMap::from([
                ("AWS_ACCESS_KEY_ID", "key"),
                ("AWS_SECRET_ACCESS_KEY", "secret"),
            ]),
        };
        let mut config = RuntimeConfig::default();
        apply_env_overrides(&mut config, &env).unwrap();

        let r2 = config.storage.r2.as_ref().unwrap();
        assert_eq!(config.storage.backend, StorageBackend::R2);
        assert_eq!(r2.access_key_id, "key");
        assert_eq!(r2.secret_access_key, "secret");
    }

    #[test]
    fn writer_overrides_apply() {
        let env = MapEnv {
            prefixed: HashMap::from([
                ("MAX_CONCURRENT_WRITES", "16"),
                ("WRITE_TIMEOUT_SECS", "5"),
                ("LOG_FORMAT", "JSON"),
            ]),
            ..Default::default()
        };
        let mut config = RuntimeConfig::default();
        apply_env_overrides(&mut config, &env).unwrap();
        assert_eq!(config.writer.resolved_concurrency(), 16);
        assert_eq!(config.writer.write_timeout_secs, 5);
        assert_eq!(config.logging.log_format, LogFormat::Json);
    }
}
