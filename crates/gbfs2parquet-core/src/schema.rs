// Canonical Arrow schema for station status snapshots
//
// Raw source columns are renamed into this schema by the normalizer. Column
// order is fixed; the writer emits files in exactly this layout.

use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// Canonical column names.
pub mod field {
    pub const EXECUTION_TIME: &str = "execution_time";
    pub const STATION_ID: &str = "station_id";
    pub const NUM_BIKES_AVAILABLE: &str = "num_bikes_available";
    pub const NUM_DOCKS_AVAILABLE: &str = "num_docks_available";
    pub const LAST_REPORTED: &str = "last_reported";
}

/// Column names as delivered by the upstream historical export.
pub mod source_field {
    pub const ID: &str = "id";
    pub const AVAILABLE_BIKES: &str = "available_bikes";
    pub const AVAILABLE_DOCKS: &str = "available_docks";
    pub const LAST_COMMUNICATION_TIME: &str = "last_communication_time";
    pub const EXECUTION_TIME: &str = "execution_time";
}

/// How a source column is coerced into its canonical type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    /// Keep the string as-is
    Text,
    /// Parse a base-10 integer
    Integer,
    /// Parse a datetime and store it as unix seconds
    UnixSeconds,
    /// Parse a datetime and store it as a UTC microsecond timestamp
    Timestamp,
}

/// One row of the static rename/cast table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMapping {
    pub source: &'static str,
    pub target: &'static str,
    pub coercion: Coercion,
}

/// Rename and cast table, in canonical column order.
pub const COLUMN_MAPPINGS: [ColumnMapping; 5] = [
    ColumnMapping {
        source: source_field::EXECUTION_TIME,
        target: field::EXECUTION_TIME,
        coercion: Coercion::Timestamp,
    },
    ColumnMapping {
        source: source_field::ID,
        target: field::STATION_ID,
        coercion: Coercion::Text,
    },
    ColumnMapping {
        source: source_field::AVAILABLE_BIKES,
        target: field::NUM_BIKES_AVAILABLE,
        coercion: Coercion::Integer,
    },
    ColumnMapping {
        source: source_field::AVAILABLE_DOCKS,
        target: field::NUM_DOCKS_AVAILABLE,
        coercion: Coercion::Integer,
    },
    ColumnMapping {
        source: source_field::LAST_COMMUNICATION_TIME,
        target: field::LAST_REPORTED,
        coercion: Coercion::UnixSeconds,
    },
];

/// Helper to create a Field with PARQUET:field_id metadata so catalogs can
/// track columns across schema changes.
fn field_with_id(name: &str, data_type: DataType, id: i32) -> Field {
    let metadata = HashMap::from([("PARQUET:field_id".to_string(), id.to_string())]);
    Field::new(name, data_type, false).with_metadata(metadata)
}

fn data_type_for(coercion: Coercion) -> DataType {
    match coercion {
        Coercion::Text => DataType::Utf8,
        Coercion::Integer | Coercion::UnixSeconds => DataType::Int64,
        Coercion::Timestamp => DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
    }
}

/// Returns a cached `Arc<Schema>` for canonical station status batches.
pub fn station_status_schema() -> Arc<Schema> {
    static SCHEMA: OnceLock<Arc<Schema>> = OnceLock::new();
    Arc::clone(SCHEMA.get_or_init(|| Arc::new(build_schema())))
}

fn build_schema() -> Schema {
    let fields = COLUMN_MAPPINGS
        .iter()
        .zip(1..)
        .map(|(mapping, id)| field_with_id(mapping.target, data_type_for(mapping.coercion), id))
        .collect::<Vec<_>>();
    Schema::new(fields)
}
