// gbfs2parquet-core - Platform-agnostic ingestion logic
//
// Pure processing for station snapshot backfills: delimited text in,
// canonical Arrow batches and hour partition keys out. No async, no storage.

mod error;
pub mod normalize;
pub mod partition;
pub mod schema;
pub mod source;
pub mod timestamp;

pub use error::{ErrorCode, IngestError, Result};
pub use normalize::normalize;
pub use partition::PartitionKey;
pub use schema::station_status_schema;
pub use source::{DelimitedSource, RawBatches};
pub use timestamp::{parse_utc_timestamp, TimestampError};
