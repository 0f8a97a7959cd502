//! Chunked reader for delimited source files.
//!
//! Every source column is read as nullable `Utf8`; typing happens later in the
//! normalizer. Rows are decoded lazily in chunks of at most `chunk_rows`, so the
//! whole source never has to fit in memory. Calling [`DelimitedSource::batches`]
//! again restarts from the first row.

use arrow::array::RecordBatch;
use arrow::csv::reader::BufReader as CsvBufReader;
use arrow::csv::reader::Format;
use arrow::csv::ReaderBuilder;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use bytes::Bytes;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{IngestError, Result};

pub const DEFAULT_DELIMITER: u8 = b'|';
pub const DEFAULT_CHUNK_ROWS: usize = 1_000_000;

#[derive(Debug, Clone)]
enum SourceHandle {
    Path(PathBuf),
    Bytes { name: String, data: Bytes },
}

/// A restartable handle on a delimited text source.
#[derive(Debug, Clone)]
pub struct DelimitedSource {
    handle: SourceHandle,
    delimiter: u8,
    chunk_rows: usize,
}

impl DelimitedSource {
    /// Open a file source. Fails if the path cannot be read.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path)
            .map_err(|e| IngestError::source_read(path.display().to_string(), e))?;
        if !metadata.is_file() {
            return Err(IngestError::source_read(
                path.display().to_string(),
                "not a regular file",
            ));
        }
        Ok(Self::with_handle(SourceHandle::Path(path.to_path_buf())))
    }

    /// Wrap an in-memory buffer.
    pub fn from_bytes(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self::with_handle(SourceHandle::Bytes {
            name: name.into(),
            data: data.into(),
        })
    }

    fn with_handle(handle: SourceHandle) -> Self {
        Self {
            handle,
            delimiter: DEFAULT_DELIMITER,
            chunk_rows: DEFAULT_CHUNK_ROWS,
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Maximum rows per batch. Zero is treated as one.
    pub fn with_chunk_rows(mut self, chunk_rows: usize) -> Self {
        self.chunk_rows = chunk_rows.max(1);
        self
    }

    pub fn chunk_rows(&self) -> usize {
        self.chunk_rows
    }

    pub fn name(&self) -> String {
        match &self.handle {
            SourceHandle::Path(path) => path.display().to_string(),
            SourceHandle::Bytes { name, .. } => name.clone(),
        }
    }

    /// Start a fresh pass over the source.
    pub fn batches(&self) -> Result<RawBatches> {
        let name = self.name();
        let mut reader: Box<dyn BufRead + Send> = match &self.handle {
            SourceHandle::Path(path) => {
                let file = File::open(path).map_err(|e| IngestError::source_read(&name, e))?;
                Box::new(BufReader::new(file))
            }
            SourceHandle::Bytes { data, .. } => Box::new(Cursor::new(data.clone())),
        };

        let Some(schema) = read_header(&mut reader, self.delimiter, &name)? else {
            tracing::debug!(source = %name, "Source is empty");
            return Ok(RawBatches {
                name,
                schema: Arc::new(Schema::empty()),
                inner: None,
            });
        };

        let csv = ReaderBuilder::new(Arc::clone(&schema))
            .with_header(false)
            .with_delimiter(self.delimiter)
            .with_batch_size(self.chunk_rows)
            .build_buffered(reader)
            .map_err(|e| IngestError::source_read(&name, e))?;

        Ok(RawBatches {
            name,
            schema,
            inner: Some(csv),
        })
    }
}

const UTF8_BOM: char = '\u{feff}';

/// Parse the header line into an all-`Utf8` schema.
///
/// The line is tokenized by arrow's csv format so quoting follows the same
/// rules as the data rows. A leading UTF-8 byte order mark is dropped.
fn read_header(
    reader: &mut dyn BufRead,
    delimiter: u8,
    name: &str,
) -> Result<Option<SchemaRef>> {
    let mut line = String::new();
    let read = reader
        .read_line(&mut line)
        .map_err(|e| IngestError::source_read(name, e))?;
    let line = line.trim_start_matches(UTF8_BOM);
    if read == 0 || line.trim().is_empty() {
        return Ok(None);
    }

    let (header, _) = Format::default()
        .with_header(true)
        .with_delimiter(delimiter)
        .infer_schema(Cursor::new(line.as_bytes()), Some(0))
        .map_err(|e| IngestError::source_read(name, format!("unreadable header: {}", e)))?;

    let mut seen = HashSet::new();
    let mut fields = Vec::with_capacity(header.fields().len());
    for field in header.fields() {
        let column = field.name().trim();
        if column.is_empty() {
            return Err(IngestError::source_read(name, "header contains an empty column name"));
        }
        if !seen.insert(column.to_string()) {
            return Err(IngestError::source_read(
                name,
                format!("header repeats column '{}'", column),
            ));
        }
        fields.push(Field::new(column, DataType::Utf8, true));
    }

    Ok(Some(Arc::new(Schema::new(fields))))
}

/// Lazy sequence of raw batches, in source order.
pub struct RawBatches {
    name: String,
    schema: SchemaRef,
    inner: Option<CsvBufReader<Box<dyn BufRead + Send>>>,
}

impl RawBatches {
    /// Schema built from the header row.
    pub fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }
}

impl Iterator for RawBatches {
    type Item = Result<RecordBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        let inner = self.inner.as_mut()?;
        match inner.next()? {
            Ok(batch) => Some(Ok(batch)),
            Err(e) => {
                // A malformed chunk ends the pass
                self.inner = None;
                Some(Err(IngestError::source_read(&self.name, e)))
            }
        }
    }
}
