//! Hour-partitioned Parquet writer pool
//!
//! Takes canonical station status batches, splits them by hour partition and
//! writes each partition as its own Snappy Parquet object, several at a time.

mod encoding;
mod error;
mod path;
pub mod pool;
mod storage;

pub use encoding::{ParquetEncoder, DEFAULT_ROW_GROUP_SIZE};
pub use error::{ErrorCode, Result, WriterError};
pub use path::ObjectPathGenerator;
pub use pool::{
    plan, BatchWriteReport, PartitionGroup, PartitionPlan, PoolOptions, WriteTaskFailure,
    WriterPool,
};
pub use storage::{build_operator, ObjectStore, OpenDalStore};

pub use gbfs2parquet_core;
