//! Error types for reading and normalizing source records

use thiserror::Error;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// E101: Source could not be opened or its delimited structure is malformed
    E101SourceRead,
    /// E102: A value could not be coerced into the canonical schema
    E102SchemaCoercion,
    /// E103: A required column is absent from the source header
    E103MissingColumn,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::E101SourceRead => "E101",
            Self::E102SchemaCoercion => "E102",
            Self::E103MissingColumn => "E103",
        }
    }
}

/// Errors raised while turning delimited text into canonical batches.
///
/// Every variant is fatal for the run: there is no per-record skip.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("[{code}] Failed to read source '{source_name}': {reason}")]
    SourceRead {
        code: &'static str,
        source_name: String,
        reason: String,
    },

    #[error("[{code}] Cannot coerce field '{field}' at row {row}: value {value:?} {reason}")]
    SchemaCoercion {
        code: &'static str,
        field: String,
        row: usize,
        value: String,
        reason: String,
    },

    #[error("[{code}] Source is missing required column '{column}'")]
    MissingColumn { code: &'static str, column: String },
}

impl IngestError {
    pub fn source_read(source_name: impl Into<String>, reason: impl ToString) -> Self {
        Self::SourceRead {
            code: ErrorCode::E101SourceRead.as_str(),
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    pub fn schema_coercion(
        field: impl Into<String>,
        row: usize,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::SchemaCoercion {
            code: ErrorCode::E102SchemaCoercion.as_str(),
            field: field.into(),
            row,
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn missing_column(column: impl Into<String>) -> Self {
        Self::MissingColumn {
            code: ErrorCode::E103MissingColumn.as_str(),
            column: column.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::SourceRead { .. } => ErrorCode::E101SourceRead,
            Self::SchemaCoercion { .. } => ErrorCode::E102SchemaCoercion,
            Self::MissingColumn { .. } => ErrorCode::E103MissingColumn,
        }
    }

    /// True for errors caused by record contents rather than the source structure.
    pub fn is_schema_error(&self) -> bool {
        matches!(self, Self::SchemaCoercion { .. } | Self::MissingColumn { .. })
    }
}

/// Result type alias for IngestError
pub type Result<T> = std::result::Result<T, IngestError>;
