//! Partitioned writer pool.
//!
//! One canonical batch is split into hour partitions, rows at or after the
//! cutoff are dropped, and every non-empty partition becomes one write task.
//! Tasks run concurrently, bounded by a semaphore that lives as long as the
//! pool; `write_batch` only returns once every task of the batch has resolved.
//!
//! A failed or timed-out write is reported and counted, never raised. Only a
//! pool that can no longer schedule work aborts the call.

use arrow::array::{Array, RecordBatch, TimestampMicrosecondArray, UInt32Array};
use arrow::compute::take_record_batch;
use chrono::{DateTime, Utc};
use gbfs2parquet_config::RuntimeConfig;
use gbfs2parquet_core::schema::field;
use gbfs2parquet_core::PartitionKey;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::encoding::ParquetEncoder;
use crate::error::{Result, WriterError};
use crate::path::ObjectPathGenerator;
use crate::storage::ObjectStore;

/// Rows of one batch that share a partition key, in input order.
#[derive(Debug, Clone)]
pub struct PartitionGroup {
    pub key: PartitionKey,
    pub batch: RecordBatch,
}

/// Result of grouping a batch before any I/O happens.
#[derive(Debug, Clone, Default)]
pub struct PartitionPlan {
    pub groups: Vec<PartitionGroup>,
    pub rows_in: usize,
    /// Rows dropped because `execution_time >= cutoff`
    pub rows_filtered: usize,
}

impl PartitionPlan {
    pub fn rows_planned(&self) -> usize {
        self.groups.iter().map(|g| g.batch.num_rows()).sum()
    }
}

/// Group a canonical batch by hour partition, dropping rows at or after `cutoff`.
///
/// Groups are ordered by partition key. Partitions whose rows are all
/// filtered out do not appear at all.
pub fn plan(batch: &RecordBatch, cutoff: DateTime<Utc>) -> Result<PartitionPlan> {
    let times = batch
        .column_by_name(field::EXECUTION_TIME)
        .and_then(|c| c.as_any().downcast_ref::<TimestampMicrosecondArray>())
        .ok_or_else(|| {
            WriterError::invalid_batch(format!(
                "batch has no {} microsecond timestamp column",
                field::EXECUTION_TIME
            ))
        })?;

    let cutoff_micros = cutoff.timestamp_micros();
    let mut rows_filtered = 0;
    let mut indices: BTreeMap<PartitionKey, Vec<u32>> = BTreeMap::new();

    for row in 0..times.len() {
        if times.is_null(row) {
            return Err(WriterError::invalid_batch(format!(
                "{} is null at row {}",
                field::EXECUTION_TIME,
                row
            )));
        }
        let micros = times.value(row);
        if micros >= cutoff_micros {
            rows_filtered += 1;
            continue;
        }
        let key = PartitionKey::from_timestamp_micros(micros).ok_or_else(|| {
            WriterError::invalid_batch(format!(
                "{} out of range at row {}: {}",
                field::EXECUTION_TIME,
                row,
                micros
            ))
        })?;
        let index = u32::try_from(row)
            .map_err(|_| WriterError::invalid_batch("batch exceeds u32::MAX rows"))?;
        indices.entry(key).or_default().push(index);
    }

    let groups = indices
        .into_iter()
        .map(|(key, rows)| {
            let batch = take_record_batch(batch, &UInt32Array::from(rows)).map_err(|e| {
                WriterError::invalid_batch(format!("Failed to slice partition {}: {}", key, e))
            })?;
            Ok(PartitionGroup { key, batch })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(PartitionPlan {
        groups,
        rows_in: batch.num_rows(),
        rows_filtered,
    })
}

/// A write task that did not complete.
#[derive(Debug, Clone)]
pub struct WriteTaskFailure {
    pub key: PartitionKey,
    pub path: String,
    pub rows: usize,
    pub reason: String,
}

/// Outcome of writing one batch.
#[derive(Debug, Clone, Default)]
pub struct BatchWriteReport {
    pub rows_in: usize,
    pub rows_filtered: usize,
    pub rows_written: usize,
    pub files_written: Vec<String>,
    pub failures: Vec<WriteTaskFailure>,
}

impl BatchWriteReport {
    pub fn tasks(&self) -> usize {
        self.files_written.len() + self.failures.len()
    }
}

/// Settings for a [`WriterPool`].
#[derive(Debug, Clone)]
pub struct PoolOptions {
    pub max_concurrent_writes: usize,
    pub write_timeout: Duration,
    pub paths: ObjectPathGenerator,
    pub encoder: ParquetEncoder,
}

impl PoolOptions {
    pub fn from_config(config: &RuntimeConfig) -> Self {
        let writer = &config.writer;
        Self {
            max_concurrent_writes: writer.resolved_concurrency(),
            write_timeout: Duration::from_secs(writer.write_timeout_secs),
            paths: ObjectPathGenerator::new(&writer.dataset, &writer.file_prefix)
                .with_storage_prefix(config.storage.prefix()),
            encoder: ParquetEncoder::new(&writer.dataset, writer.row_group_size),
        }
    }
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self::from_config(&RuntimeConfig::default())
    }
}

struct TaskOutcome {
    key: PartitionKey,
    path: String,
    rows: usize,
    result: Result<()>,
}

/// Bounded pool of concurrent partition writes, built once per process.
pub struct WriterPool {
    store: Arc<dyn ObjectStore>,
    encoder: Arc<ParquetEncoder>,
    paths: ObjectPathGenerator,
    permits: Arc<Semaphore>,
    max_concurrent_writes: usize,
    write_timeout: Duration,
}

impl WriterPool {
    pub fn new(store: Arc<dyn ObjectStore>, options: PoolOptions) -> Self {
        let max_concurrent_writes = options.max_concurrent_writes.max(1);
        Self {
            store,
            encoder: Arc::new(options.encoder),
            paths: options.paths,
            permits: Arc::new(Semaphore::new(max_concurrent_writes)),
            max_concurrent_writes,
            write_timeout: options.write_timeout,
        }
    }

    pub fn max_concurrent_writes(&self) -> usize {
        self.max_concurrent_writes
    }

    /// Stop accepting work. Later `write_batch` calls fail with a pool error.
    pub fn shutdown(&self) {
        self.permits.close();
    }

    /// Write every partition of `batch` and wait for all of them.
    pub async fn write_batch(
        &self,
        batch: &RecordBatch,
        cutoff: DateTime<Utc>,
    ) -> Result<BatchWriteReport> {
        let plan = plan(batch, cutoff)?;
        let mut report = BatchWriteReport {
            rows_in: plan.rows_in,
            rows_filtered: plan.rows_filtered,
            ..Default::default()
        };

        let mut tasks = JoinSet::new();
        let mut in_flight: HashMap<tokio::task::Id, (PartitionKey, String, usize)> =
            HashMap::new();

        for group in plan.groups {
            // Waits here while the pool is saturated
            let permit = Arc::clone(&self.permits)
                .acquire_owned()
                .await
                .map_err(|_| WriterError::pool_scheduling("writer pool is shut down"))?;

            let path = self.paths.generate_path(group.key.start());
            let rows = group.batch.num_rows();
            let key = group.key;
            let store = Arc::clone(&self.store);
            let encoder = Arc::clone(&self.encoder);
            let timeout = self.write_timeout;
            let task_path = path.clone();

            let handle = tasks.spawn(async move {
                let _permit = permit;
                let result =
                    write_group(store.as_ref(), &encoder, &task_path, &group.batch, timeout).await;
                TaskOutcome {
                    key,
                    path: task_path,
                    rows,
                    result,
                }
            });
            in_flight.insert(handle.id(), (key, path, rows));
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((id, outcome)) => {
                    in_flight.remove(&id);
                    match outcome.result {
                        Ok(()) => {
                            debug!(
                                partition = %outcome.key,
                                path = %outcome.path,
                                rows = outcome.rows,
                                "Wrote partition file"
                            );
                            report.rows_written += outcome.rows;
                            report.files_written.push(outcome.path);
                        }
                        Err(e) => {
                            warn!(
                                partition = %outcome.key,
                                path = %outcome.path,
                                rows = outcome.rows,
                                error = %e,
                                "Partition write failed"
                            );
                            report.failures.push(WriteTaskFailure {
                                key: outcome.key,
                                path: outcome.path,
                                rows: outcome.rows,
                                reason: e.to_string(),
                            });
                        }
                    }
                }
                Err(e) if e.is_panic() => {
                    let Some((key, path, rows)) = in_flight.remove(&e.id()) else {
                        return Err(WriterError::pool_scheduling(format!(
                            "unknown write task panicked: {}",
                            e
                        )));
                    };
                    warn!(partition = %key, path = %path, "Partition write panicked");
                    report.failures.push(WriteTaskFailure {
                        key,
                        path,
                        rows,
                        reason: format!("write task panicked: {}", e),
                    });
                }
                Err(e) => {
                    return Err(WriterError::pool_scheduling(format!(
                        "write task was cancelled: {}",
                        e
                    )));
                }
            }
        }

        Ok(report)
    }
}

async fn write_group(
    store: &dyn ObjectStore,
    encoder: &ParquetEncoder,
    path: &str,
    batch: &RecordBatch,
    timeout: Duration,
) -> Result<()> {
    let payload = encoder.encode(batch)?;
    match tokio::time::timeout(timeout, store.put(path, payload)).await {
        Ok(result) => result,
        Err(_) => Err(WriterError::timeout(path, timeout)),
    }
}
