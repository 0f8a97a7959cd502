// Schema normalizer: raw string batches -> canonical station status batches
//
// Renames and casts follow the static COLUMN_MAPPINGS table. Any value that
// cannot be coerced fails the whole batch; rows are never skipped.

use arrow::array::{
    Array, ArrayRef, AsArray, Int64Builder, RecordBatch, StringArray, StringBuilder,
    TimestampMicrosecondBuilder,
};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use std::sync::Arc;

use crate::error::{IngestError, Result};
use crate::schema::{station_status_schema, ColumnMapping, Coercion, COLUMN_MAPPINGS};
use crate::timestamp::parse_utc_timestamp;

/// Convert a raw batch into the canonical schema.
///
/// Row numbers in errors are zero-based and relative to `raw`.
pub fn normalize(raw: &RecordBatch) -> Result<RecordBatch> {
    let columns = COLUMN_MAPPINGS
        .iter()
        .map(|mapping| {
            let values = source_strings(raw, mapping)?;
            coerce_column(mapping, &values)
        })
        .collect::<Result<Vec<ArrayRef>>>()?;

    RecordBatch::try_new(station_status_schema(), columns).map_err(|e| {
        IngestError::schema_coercion("<batch>", 0, "", format!("does not match schema: {}", e))
    })
}

fn source_strings(raw: &RecordBatch, mapping: &ColumnMapping) -> Result<StringArray> {
    let column = raw
        .column_by_name(mapping.source)
        .ok_or_else(|| IngestError::missing_column(mapping.source))?;

    if let Some(strings) = column.as_string_opt::<i32>() {
        return Ok(strings.clone());
    }

    // Typed inputs (e.g. from an inferring reader) are stringified first
    let as_utf8 = cast(column, &DataType::Utf8).map_err(|e| {
        IngestError::schema_coercion(mapping.target, 0, "", format!("cannot be read as text: {}", e))
    })?;
    Ok(as_utf8.as_string::<i32>().clone())
}

fn coerce_column(mapping: &ColumnMapping, values: &StringArray) -> Result<ArrayRef> {
    match mapping.coercion {
        Coercion::Text => {
            let mut builder = StringBuilder::with_capacity(values.len(), values.value_data().len());
            for row in 0..values.len() {
                builder.append_value(required(mapping, values, row)?);
            }
            Ok(Arc::new(builder.finish()))
        }
        Coercion::Integer => {
            let mut builder = Int64Builder::with_capacity(values.len());
            for row in 0..values.len() {
                let raw = required(mapping, values, row)?;
                let parsed = raw.trim().parse::<i64>().map_err(|_| {
                    IngestError::schema_coercion(mapping.target, row, raw, "is not an integer")
                })?;
                builder.append_value(parsed);
            }
            Ok(Arc::new(builder.finish()))
        }
        Coercion::UnixSeconds => {
            let mut builder = Int64Builder::with_capacity(values.len());
            for row in 0..values.len() {
                let raw = required(mapping, values, row)?;
                let ts = parse_utc_timestamp(raw).map_err(|e| {
                    IngestError::schema_coercion(mapping.target, row, raw, e.to_string())
                })?;
                builder.append_value(ts.timestamp());
            }
            Ok(Arc::new(builder.finish()))
        }
        Coercion::Timestamp => {
            let mut builder =
                TimestampMicrosecondBuilder::with_capacity(values.len()).with_timezone("UTC");
            for row in 0..values.len() {
                let raw = required(mapping, values, row)?;
                let ts = parse_utc_timestamp(raw).map_err(|e| {
                    IngestError::schema_coercion(mapping.target, row, raw, e.to_string())
                })?;
                builder.append_value(ts.timestamp_micros());
            }
            Ok(Arc::new(builder.finish()))
        }
    }
}

fn required<'a>(mapping: &ColumnMapping, values: &'a StringArray, row: usize) -> Result<&'a str> {
    if values.is_null(row) {
        return Err(IngestError::schema_coercion(
            mapping.target,
            row,
            "",
            "is missing",
        ));
    }
    Ok(values.value(row))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::field;
    use arrow::array::{Int64Array, TimestampMicrosecondArray};
    use arrow::datatypes::{Field, Schema};
    use chrono::{TimeZone, Utc};

    const COLUMNS: [&str; 6] = [
        "id",
        "available_bikes",
        "available_docks",
        "last_communication_time",
        "execution_time",
        "status_key",
    ];

    fn raw_batch(rows: &[[Option<&str>; 6]]) -> RecordBatch {
        let schema = Arc::new(Schema::new(
            COLUMNS
                .iter()
                .map(|name| Field::new(*name, DataType::Utf8, true))
                .collect::<Vec<_>>(),
        ));
        let columns = (0..COLUMNS.len())
            .map(|c| {
                Arc::new(StringArray::from(
                    rows.iter().map(|row| row[c]).collect::<Vec<_>>(),
                )) as ArrayRef
            })
            .collect();
        RecordBatch::try_new(schema, columns).unwrap()
    }

    fn row<'a>(id: &'a str, bikes: &'a str, exec: &'a str) -> [Option<&'a str>; 6] {
        [
            Some(id),
            Some(bikes),
            Some("20"),
            Some("2019-08-01 09:59:00"),
            Some(exec),
            Some("1"),
        ]
    }

    #[test]
    fn spreadsheet_export_with_byte_order_mark_normalizes() {
        let data = "\u{feff}id|available_bikes|available_docks|last_communication_time|execution_time\n\
                    72|10|29|2019-08-01 10:00:01|2019-08-01 10:00:05\n";
        let source = crate::DelimitedSource::from_bytes("bom", data);
        let raw = source.batches().unwrap().next().unwrap().unwrap();
        let batch = normalize(&raw).unwrap();
        assert_eq!(batch.num_rows(), 1);
        assert_eq!(
            batch
                .column_by_name(field::STATION_ID)
                .unwrap()
                .as_string::<i32>()
                .value(0),
            "72"
        );
    }

    #[test]
    fn renames_and_casts_into_canonical_schema() {
        let raw = raw_batch(&[row("72", "10", "2019-08-01 10:00:05")]);
        let batch = normalize(&raw).unwrap();

        assert_eq!(batch.schema(), station_status_schema());
        assert_eq!(batch.num_rows(), 1);

        let station = batch
            .column_by_name(field::STATION_ID)
            .unwrap()
            .as_string::<i32>();
        assert_eq!(station.value(0), "72");

        let bikes = batch
            .column_by_name(field::NUM_BIKES_AVAILABLE)
            .unwrap()
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(bikes.value(0), 10);

        let last_reported = batch
            .column_by_name(field::LAST_REPORTED)
            .unwrap()
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        let expected = Utc.with_ymd_and_hms(2019, 8, 1, 9, 59, 0).unwrap();
        assert_eq!(last_reported.value(0), expected.timestamp());

        let exec = batch
            .column_by_name(field::EXECUTION_TIME)
            .unwrap()
            .as_any()
            .downcast_ref::<TimestampMicrosecondArray>()
            .unwrap();
        let expected = Utc.with_ymd_and_hms(2019, 8, 1, 10, 0, 5).unwrap();
        assert_eq!(exec.value(0), expected.timestamp_micros());
    }

    #[test]
    fn extra_source_columns_are_dropped() {
        let raw = raw_batch(&[row("72", "10", "2019-08-01 10:00:05")]);
        let batch = normalize(&raw).unwrap();
        assert_eq!(batch.num_columns(), 5);
        assert!(batch.column_by_name("status_key").is_none());
    }

    #[test]
    fn non_numeric_bike_count_fails_whole_batch() {
        let raw = raw_batch(&[
            row("72", "10", "2019-08-01 10:00:05"),
            row("79", "lots", "2019-08-01 10:00:06"),
        ]);
        match normalize(&raw) {
            Err(IngestError::SchemaCoercion {
                field, row, value, ..
            }) => {
                assert_eq!(field, "num_bikes_available");
                assert_eq!(row, 1);
                assert_eq!(value, "lots");
            }
            other => panic!("expected coercion error, got {:?}", other),
        }
    }

    #[test]
    fn missing_value_is_a_coercion_error() {
        let mut r = row("72", "10", "2019-08-01 10:00:05");
        r[0] = None;
        let err = normalize(&raw_batch(&[r])).unwrap_err();
        assert!(matches!(err, IngestError::SchemaCoercion { ref field, .. } if field == "station_id"));
    }

    #[test]
    fn ambiguous_timezone_is_a_coercion_error() {
        let raw = raw_batch(&[row("72", "10", "2019-08-01 10:00:05 EDT")]);
        let err = normalize(&raw).unwrap_err();
        assert!(err.to_string().contains("ambiguous timezone"));
    }

    #[test]
    fn missing_column_is_reported_by_source_name() {
        let schema = Arc::new(Schema::new(vec![Field::new("id", DataType::Utf8, true)]));
        let raw = RecordBatch::try_new(
            schema,
            vec![Arc::new(StringArray::from(vec!["72"])) as ArrayRef],
        )
        .unwrap();
        let err = normalize(&raw).unwrap_err();
        assert!(matches!(err, IngestError::MissingColumn { ref column, .. } if column == "execution_time"));
    }
}
