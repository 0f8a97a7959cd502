// Hour-granularity partition keys
//
// A key is the event time truncated to the hour. Its rendered form
// (`YYYY-MM-DD HH`) is fixed-width, so string order matches time order and
// string equality matches truncated-time equality.

use chrono::{DateTime, DurationRound, TimeDelta, TimeZone, Timelike, Utc};
use std::fmt;

pub const PARTITION_KEY_FORMAT: &str = "%Y-%m-%d %H";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartitionKey {
    hour: DateTime<Utc>,
}

impl PartitionKey {
    /// Truncate a timestamp to its partition hour.
    pub fn derive(timestamp: DateTime<Utc>) -> Self {
        let hour = timestamp
            .duration_trunc(TimeDelta::hours(1))
            .unwrap_or_else(|_| truncate_fields(timestamp));
        Self { hour }
    }

    /// Derive from a UTC microsecond timestamp as stored in canonical batches.
    ///
    /// Returns None when the value lies outside chrono's representable range.
    pub fn from_timestamp_micros(micros: i64) -> Option<Self> {
        DateTime::from_timestamp_micros(micros).map(Self::derive)
    }

    /// Start of the partition hour.
    pub fn start(&self) -> DateTime<Utc> {
        self.hour
    }
}

fn truncate_fields(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    let naive = timestamp.naive_utc();
    let hour = naive
        .with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(naive);
    Utc.from_utc_datetime(&hour)
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.hour.format(PARTITION_KEY_FORMAT))
    }
}
