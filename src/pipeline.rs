// Backfill driver
//
// Single control loop: read one chunk, normalize it, hand it to the writer
// pool and wait for every write of that chunk before reading the next.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use gbfs2parquet_core::{normalize, parse_utc_timestamp, DelimitedSource};
use gbfs2parquet_writer::WriterPool;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::error::PipelineError;

/// Where the driver is in its read/normalize/write loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Reading,
    Normalizing,
    Writing,
    Drained,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Reading => "reading",
            Self::Normalizing => "normalizing",
            Self::Writing => "writing",
            Self::Drained => "drained",
        };
        f.write_str(name)
    }
}

/// Totals for a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillSummary {
    pub batches: usize,
    pub rows_read: usize,
    pub rows_written: usize,
    pub rows_filtered: usize,
    pub files_written: usize,
    pub write_failures: usize,
    pub elapsed: Duration,
}

impl BackfillSummary {
    /// True when every partition write succeeded.
    pub fn is_success(&self) -> bool {
        self.write_failures == 0
    }
}

impl fmt::Display for BackfillSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} batches fully processed, {} write failures among them \
             ({} rows read, {} written, {} past cutoff, {} files)",
            self.batches,
            self.write_failures,
            self.rows_read,
            self.rows_written,
            self.rows_filtered,
            self.files_written
        )
    }
}

/// Parse the exclusive cutoff bound.
///
/// Accepts everything a source timestamp may look like, plus a bare
/// `YYYY-MM-DD` date meaning midnight UTC.
pub fn parse_cutoff(raw: &str) -> Result<DateTime<Utc>, PipelineError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PipelineError::invalid_cutoff(raw, "is empty"));
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN).and_utc());
    }
    parse_utc_timestamp(trimmed).map_err(|e| PipelineError::invalid_cutoff(raw, e.to_string()))
}

/// One backfill run over a source.
pub struct Backfill<'a> {
    source: &'a DelimitedSource,
    pool: &'a WriterPool,
    cutoff: DateTime<Utc>,
    state: PipelineState,
}

impl<'a> Backfill<'a> {
    pub fn new(source: &'a DelimitedSource, pool: &'a WriterPool, cutoff: DateTime<Utc>) -> Self {
        Self {
            source,
            pool,
            cutoff,
            state: PipelineState::Idle,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    fn transition(&mut self, next: PipelineState) {
        debug!(from = %self.state, to = %next, "Pipeline state change");
        self.state = next;
    }

    /// Drive the source to exhaustion or to the first fatal error.
    ///
    /// The run always ends in `Drained`. Nothing is written after a fatal
    /// error, and a batch that fails normalization writes nothing at all.
    pub async fn run(&mut self) -> Result<BackfillSummary, PipelineError> {
        let result = self.drive().await;
        self.transition(PipelineState::Drained);
        match &result {
            Ok(summary) => info!(
                batches = summary.batches,
                rows_read = summary.rows_read,
                rows_written = summary.rows_written,
                rows_filtered = summary.rows_filtered,
                files_written = summary.files_written,
                write_failures = summary.write_failures,
                elapsed_ms = summary.elapsed.as_millis() as u64,
                "Backfill drained"
            ),
            Err(e) => error!(code = e.code(), batch = ?e.batch(), error = %e, "Backfill aborted"),
        }
        result
    }

    async fn drive(&mut self) -> Result<BackfillSummary, PipelineError> {
        let started = Instant::now();
        let mut summary = BackfillSummary::default();

        info!(
            source = %self.source.name(),
            chunk_rows = self.source.chunk_rows(),
            cutoff = %self.cutoff,
            max_concurrent_writes = self.pool.max_concurrent_writes(),
            "Starting backfill"
        );

        self.transition(PipelineState::Reading);
        let batches = self
            .source
            .batches()
            .map_err(|e| PipelineError::ingest(0, 0, e))?;

        let mut index = 0;
        for raw in batches {
            let first_row = summary.rows_read;
            let raw = raw.map_err(|e| PipelineError::ingest(index, first_row, e))?;
            if raw.num_rows() == 0 {
                continue;
            }
            let batch_started = Instant::now();

            self.transition(PipelineState::Normalizing);
            let canonical =
                normalize(&raw).map_err(|e| PipelineError::ingest(index, first_row, e))?;

            self.transition(PipelineState::Writing);
            let report = self
                .pool
                .write_batch(&canonical, self.cutoff)
                .await
                .map_err(|source| PipelineError::writer(index, source))?;

            summary.batches += 1;
            summary.rows_read += raw.num_rows();
            summary.rows_written += report.rows_written;
            summary.rows_filtered += report.rows_filtered;
            summary.files_written += report.files_written.len();
            summary.write_failures += report.failures.len();

            for failure in &report.failures {
                warn!(
                    batch = index,
                    partition = %failure.key,
                    path = %failure.path,
                    rows = failure.rows,
                    reason = %failure.reason,
                    "Partition left unwritten"
                );
            }
            info!(
                batch = index,
                rows = raw.num_rows(),
                files = report.files_written.len(),
                failures = report.failures.len(),
                filtered = report.rows_filtered,
                elapsed_ms = batch_started.elapsed().as_millis() as u64,
                "Batch complete"
            );

            index += 1;
            self.transition(PipelineState::Reading);
        }

        summary.elapsed = started.elapsed();
        Ok(summary)
    }
}

/// Run a backfill of `source` through `pool`, keeping rows strictly before `cutoff`.
pub async fn run_backfill(
    source: &DelimitedSource,
    pool: &WriterPool,
    cutoff: DateTime<Utc>,
) -> Result<BackfillSummary, PipelineError> {
    Backfill::new(source, pool, cutoff).run().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn cutoff_accepts_common_forms() {
        let expected = Utc.with_ymd_and_hms(2019, 8, 1, 18, 52, 3).unwrap();
        assert_eq!(parse_cutoff("2019-08-01 18:52:03").unwrap(), expected);
        assert_eq!(parse_cutoff("2019-08-01T18:52:03Z").unwrap(), expected);
        assert_eq!(parse_cutoff(" 2019-08-01T20:52:03+02:00 ").unwrap(), expected);
        assert_eq!(parse_cutoff("2019-08-01 18:52:03 UTC").unwrap(), expected);
        assert_eq!(parse_cutoff("2019-08-01 20:52:03+02").unwrap(), expected);
        assert_eq!(
            parse_cutoff("2019-08-02").unwrap(),
            Utc.with_ymd_and_hms(2019, 8, 2, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn cutoff_rejects_garbage_and_named_zones() {
        assert!(matches!(
            parse_cutoff("soon"),
            Err(PipelineError::InvalidCutoff { .. })
        ));
        assert!(parse_cutoff("").is_err());
        assert!(parse_cutoff("2019-08-01 18:52:03 EDT").is_err());
    }

    #[test]
    fn summary_success_tracks_failures() {
        let mut summary = BackfillSummary {
            batches: 2,
            ..Default::default()
        };
        assert!(summary.is_success());
        summary.write_failures = 1;
        assert!(!summary.is_success());
        assert!(summary
            .to_string()
            .starts_with("2 batches fully processed, 1 write failures"));
    }
}
