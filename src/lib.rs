// gbfs2parquet - hour-partitioned Parquet backfill of station status snapshots
//
// Reads a delimited snapshot dump in bounded chunks, normalizes each chunk to
// the canonical schema and fans its hour partitions out to object storage.

mod error;
pub mod init;
pub mod pipeline;

pub use error::{ErrorCode, PipelineError};
pub use pipeline::{parse_cutoff, run_backfill, Backfill, BackfillSummary, PipelineState};

use gbfs2parquet_config::RuntimeConfig;
use gbfs2parquet_core::DelimitedSource;
use std::path::Path;

/// Open `path` as a delimited source using the configured delimiter and chunk size.
pub fn open_source(
    path: impl AsRef<Path>,
    config: &RuntimeConfig,
) -> Result<DelimitedSource, PipelineError> {
    let source = DelimitedSource::open(path)
        .map_err(|source| PipelineError::Source { batch: 0, source })?;
    Ok(source
        .with_delimiter(config.source.delimiter_byte())
        .with_chunk_rows(config.source.chunk_rows))
}

/// Load-config-to-summary entry point for embedders.
///
/// The cutoff comes from `config.backfill.cutoff`, which must be set.
pub async fn run_with_config(
    source_path: impl AsRef<Path>,
    config: &RuntimeConfig,
) -> Result<BackfillSummary, PipelineError> {
    let raw_cutoff = config
        .backfill
        .cutoff
        .as_deref()
        .ok_or_else(|| PipelineError::invalid_cutoff("", "no cutoff configured"))?;
    let cutoff = parse_cutoff(raw_cutoff)?;
    let source = open_source(source_path, config)?;
    let pool = init::init_writer(config)?;
    run_backfill(&source, &pool, cutoff).await
}
