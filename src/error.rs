// Fatal pipeline errors
//
// Everything here ends the run. Per-partition write failures are not errors
// at this level; they are counted in the summary.

use gbfs2parquet_core::IngestError;
use gbfs2parquet_writer::WriterError;
use thiserror::Error;

/// Error codes for failures owned by the driver itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// E104: Cutoff timestamp missing or unparseable
    E104InvalidCutoff,
    /// E105: Object store could not be initialized
    E105Storage,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::E104InvalidCutoff => "E104",
            Self::E105Storage => "E105",
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Source unreadable or malformed
    #[error("batch {batch}: {source}")]
    Source {
        batch: usize,
        #[source]
        source: IngestError,
    },

    /// A batch could not be coerced into the canonical schema
    #[error("batch {batch} (source rows from {first_row}): {source}")]
    Schema {
        batch: usize,
        first_row: usize,
        #[source]
        source: IngestError,
    },

    /// The writer pool could not take or run the batch's writes
    #[error("batch {batch}: {source}")]
    PoolScheduling {
        batch: usize,
        #[source]
        source: WriterError,
    },

    /// A normalized batch could not be split into hour partitions
    #[error("batch {batch}: {source}")]
    Partition {
        batch: usize,
        #[source]
        source: WriterError,
    },

    #[error("[{code}] Invalid cutoff {value:?}: {reason}")]
    InvalidCutoff {
        code: &'static str,
        value: String,
        reason: String,
    },

    #[error("[{code}] Failed to initialize storage: {source}")]
    Storage {
        code: &'static str,
        #[source]
        source: WriterError,
    },
}

impl PipelineError {
    pub fn invalid_cutoff(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidCutoff {
            code: ErrorCode::E104InvalidCutoff.as_str(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn storage(source: WriterError) -> Self {
        Self::Storage {
            code: ErrorCode::E105Storage.as_str(),
            source,
        }
    }

    /// Route a read or normalization error to the matching variant.
    pub(crate) fn ingest(batch: usize, first_row: usize, source: IngestError) -> Self {
        if source.is_schema_error() {
            Self::Schema {
                batch,
                first_row,
                source,
            }
        } else {
            Self::Source { batch, source }
        }
    }

    /// Route a `write_batch` error: scheduling failures stay scheduling
    /// failures, anything raised while planning the batch is a partition error.
    pub(crate) fn writer(batch: usize, source: WriterError) -> Self {
        if matches!(source, WriterError::PoolScheduling { .. }) {
            Self::PoolScheduling { batch, source }
        } else {
            Self::Partition { batch, source }
        }
    }

    /// Error code string, delegating to the wrapped error where there is one.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Source { source, .. } | Self::Schema { source, .. } => source.code().as_str(),
            Self::PoolScheduling { source, .. } | Self::Partition { source, .. } => {
                source.code().as_str()
            }
            Self::InvalidCutoff { code, .. } | Self::Storage { code, .. } => code,
        }
    }

    /// Batch the error occurred in, when it happened mid-run.
    pub fn batch(&self) -> Option<usize> {
        match self {
            Self::Source { batch, .. }
            | Self::Schema { batch, .. }
            | Self::PoolScheduling { batch, .. }
            | Self::Partition { batch, .. } => Some(*batch),
            Self::InvalidCutoff { .. } | Self::Storage { .. } => None,
        }
    }
}
