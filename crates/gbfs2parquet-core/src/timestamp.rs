//! UTC timestamp parsing for source datetime columns.
//!
//! Naive timestamps (no offset) are taken to be UTC already. Timestamps that
//! carry a numeric offset, or an explicit `UTC`/`GMT`/`Z` designator, are
//! converted to UTC. Other zone abbreviations such as `EST` cannot be resolved
//! to a single offset and are rejected.

use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

// %#z takes +hh, +hhmm and +hh:mm
const OFFSET_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f%#z",
    "%Y-%m-%dT%H:%M:%S%.f%#z",
    "%Y-%m-%d %H:%M%#z",
    "%Y-%m-%dT%H:%M%#z",
];

const UTC_DESIGNATORS: [&str; 3] = ["UTC", "GMT", "Z"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimestampError {
    #[error("has an ambiguous timezone designator; use a numeric UTC offset or a naive UTC time")]
    AmbiguousTimezone,
    #[error("is not a recognized timestamp")]
    Unrecognized,
}

/// Parse a source datetime string into UTC.
pub fn parse_utc_timestamp(raw: &str) -> Result<DateTime<Utc>, TimestampError> {
    let value = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(value, format) {
            return Ok(dt.with_timezone(&Utc));
        }
    }

    if let Some(naive) = parse_naive(value) {
        return Ok(naive.and_utc());
    }

    if let Some(naive) = strip_utc_designator(value).and_then(parse_naive) {
        return Ok(naive.and_utc());
    }

    if has_zone_suffix(value) {
        Err(TimestampError::AmbiguousTimezone)
    } else {
        Err(TimestampError::Unrecognized)
    }
}

fn parse_naive(value: &str) -> Option<NaiveDateTime> {
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
}

/// The datetime part of `value` when it ends in a UTC designator (any case).
fn strip_utc_designator(value: &str) -> Option<&str> {
    UTC_DESIGNATORS.iter().find_map(|designator| {
        let split = value.len().checked_sub(designator.len())?;
        let tail = value.get(split..)?;
        if tail.eq_ignore_ascii_case(designator) {
            value.get(..split).map(str::trim_end)
        } else {
            None
        }
    })
}

/// A parseable datetime followed by alphabetic zone text, e.g. `2019-08-01 10:00:00 EDT`.
fn has_zone_suffix(value: &str) -> bool {
    let Some((head, tail)) = value.rsplit_once(' ') else {
        return false;
    };
    !tail.is_empty() && tail.chars().all(|c| c.is_ascii_alphabetic()) && parse_naive(head).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn naive_timestamp_is_taken_as_utc() {
        let ts = parse_utc_timestamp("2019-08-01 18:52:03").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2019, 8, 1, 18, 52, 3).unwrap());
    }

    #[test]
    fn fractional_seconds_and_t_separator_are_accepted() {
        let ts = parse_utc_timestamp("2019-08-01T18:52:03.250").unwrap();
        assert_eq!(ts.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn numeric_offsets_are_normalized() {
        let ts = parse_utc_timestamp("2019-08-01 14:52:03-04:00").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2019, 8, 1, 18, 52, 3).unwrap());

        let ts = parse_utc_timestamp("2019-08-01T18:52:03Z").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2019, 8, 1, 18, 52, 3).unwrap());

        let ts = parse_utc_timestamp("2019-08-01 20:52:03+0200").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2019, 8, 1, 18, 52, 3).unwrap());
    }

    #[test]
    fn zone_abbreviations_are_rejected() {
        assert_eq!(
            parse_utc_timestamp("2019-08-01 18:52:03 EDT"),
            Err(TimestampError::AmbiguousTimezone)
        );
    }

    #[test]
    fn utc_designators_are_accepted() {
        let expected = Utc.with_ymd_and_hms(2019, 8, 1, 18, 52, 3).unwrap();
        assert_eq!(parse_utc_timestamp("2019-08-01 18:52:03 UTC"), Ok(expected));
        assert_eq!(parse_utc_timestamp("2019-08-01 18:52:03 GMT"), Ok(expected));
        assert_eq!(parse_utc_timestamp("2019-08-01 18:52:03 utc"), Ok(expected));
        assert_eq!(parse_utc_timestamp("2019-08-01 18:52:03Z"), Ok(expected));
        assert_eq!(
            parse_utc_timestamp("2019-08-01T18:52Z"),
            Ok(Utc.with_ymd_and_hms(2019, 8, 1, 18, 52, 0).unwrap())
        );
    }

    #[test]
    fn hour_only_offsets_are_accepted() {
        let expected = Utc.with_ymd_and_hms(2019, 8, 1, 18, 52, 3).unwrap();
        assert_eq!(parse_utc_timestamp("2019-08-01 18:52:03+00"), Ok(expected));
        assert_eq!(parse_utc_timestamp("2019-08-01T20:52:03+02"), Ok(expected));
    }

    #[test]
    fn minute_precision_is_accepted() {
        let expected = Utc.with_ymd_and_hms(2019, 8, 1, 18, 52, 0).unwrap();
        assert_eq!(parse_utc_timestamp("2019-08-01T18:52"), Ok(expected));
        assert_eq!(parse_utc_timestamp("2019-08-01 18:52"), Ok(expected));
        assert_eq!(parse_utc_timestamp("2019-08-01T14:52-04:00"), Ok(expected));
    }

    #[test]
    fn other_abbreviations_stay_ambiguous() {
        assert_eq!(
            parse_utc_timestamp("2019-08-01 18:52:03 CEST"),
            Err(TimestampError::AmbiguousTimezone)
        );
    }

    #[test]
    fn garbage_is_unrecognized() {
        assert_eq!(
            parse_utc_timestamp("yesterday"),
            Err(TimestampError::Unrecognized)
        );
        assert_eq!(parse_utc_timestamp(""), Err(TimestampError::Unrecognized));
    }
}
