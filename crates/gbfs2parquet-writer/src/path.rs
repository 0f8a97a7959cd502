//! Object path generation for hour-partitioned snapshots.
//!
//! Layout:
//! `{storage_prefix}{dataset}/{YYYY}/{MM}/{DD}/{HH}/{file_prefix}-{YYYY}-{MM}-{DD}-{HH}-{mm}-{ss}-{uuid}.parquet`
//!
//! Every call draws a fresh UUID, so concurrent writers targeting the same
//! partition never collide. Nothing is ever overwritten or deduplicated: a
//! partition is a directory of independently named files, and compacting them
//! is left to downstream jobs.

use chrono::{DateTime, Datelike, Timelike, Utc};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ObjectPathGenerator {
    storage_prefix: String,
    dataset: String,
    file_prefix: String,
}

impl ObjectPathGenerator {
    pub fn new(dataset: impl Into<String>, file_prefix: impl Into<String>) -> Self {
        Self {
            storage_prefix: String::new(),
            dataset: dataset.into(),
            file_prefix: file_prefix.into(),
        }
    }

    /// Prefix prepended to every key (e.g. "backfill-2019/"). A trailing slash is added if missing.
    pub fn with_storage_prefix(mut self, prefix: Option<&str>) -> Self {
        self.storage_prefix = match prefix {
            Some(p) if !p.is_empty() && !p.ends_with('/') => format!("{}/", p),
            Some(p) => p.to_string(),
            None => String::new(),
        };
        self
    }

    /// Directory holding every file for the hour containing `timestamp`.
    pub fn partition_prefix(&self, timestamp: DateTime<Utc>) -> String {
        format!(
            "{}{}/{:04}/{:02}/{:02}/{:02}",
            self.storage_prefix,
            self.dataset,
            timestamp.year(),
            timestamp.month(),
            timestamp.day(),
            timestamp.hour()
        )
    }

    /// Full object key for a new file in the partition of `timestamp`.
    pub fn generate_path(&self, timestamp: DateTime<Utc>) -> String {
        format!(
            "{}/{}-{:04}-{:02}-{:02}-{:02}-{:02}-{:02}-{}.parquet",
            self.partition_prefix(timestamp),
            self.file_prefix,
            timestamp.year(),
            timestamp.month(),
            timestamp.day(),
            timestamp.hour(),
            timestamp.minute(),
            timestamp.second(),
            Uuid::new_v4().simple()
        )
    }
}
