//! Format adapters for import/export.
//!
//! Each format implements [`RowReader`] and [`RowWriter`]. The factories
//! below pick the adapter for a [`Format`] and a source or destination.

mod arrow_types;
pub mod csv;
pub mod json;
pub mod parquet;
pub mod partitioned;

use crate::io::traits::{RowReader, RowWriter};
use crate::models::{ColumnSpec, Compression, CopyOptions};
use crate::{Error, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Supported file formats for import/export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// Delimited text (CSV and friends).
    Delimited,
    /// Apache Parquet, single file or partitioned dataset.
    Columnar,
    /// Newline-delimited JSON objects.
    Json,
}

impl Format {
    /// Returns the file extension for this format.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Delimited => "csv",
            Self::Columnar => "parquet",
            Self::Json => "json",
        }
    }

    /// Detects format from file extension.
    ///
    /// Returns `None` when the path has no recognised extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        match ext.as_deref() {
            Some("csv" | "tsv" | "txt") => Some(Self::Delimited),
            Some("parquet" | "pq") => Some(Self::Columnar),
            Some("json" | "ndjson" | "jsonl") => Some(Self::Json),
            _ => None,
        }
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "csv" | "tsv" | "delimited" | "text" => Ok(Self::Delimited),
            "parquet" | "pq" | "columnar" => Ok(Self::Columnar),
            "json" | "ndjson" | "jsonl" => Ok(Self::Json),
            _ => Err(Error::InvalidInput(format!("Unknown format: {s}"))),
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Delimited => write!(f, "delimited"),
            Self::Columnar => write!(f, "columnar"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Delimited text settings taken from `COPY` options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelimitedOptions {
    /// Field separator.
    pub delimiter: u8,
    /// Quote character.
    pub quote: u8,
    /// Escape character; quotes are doubled when absent.
    pub escape: Option<u8>,
    /// Whether the first record is a header.
    pub header: bool,
    /// Text that stands for null.
    pub null_token: String,
}

impl DelimitedOptions {
    /// Extracts delimited settings from `COPY` options.
    #[must_use]
    pub fn from_options(options: &CopyOptions) -> Self {
        Self {
            delimiter: options.delimiter(),
            quote: options.quote(),
            escape: options.escape(),
            header: options.header(),
            null_token: options.null_token(),
        }
    }
}

impl Default for DelimitedOptions {
    fn default() -> Self {
        Self::from_options(&CopyOptions::new())
    }
}

/// Columnar file settings taken from `COPY` options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnarOptions {
    /// Rows per row group, and per read batch.
    pub chunk_size: usize,
    /// Compression codec.
    pub compression: Compression,
}

impl ColumnarOptions {
    /// Extracts columnar settings from `COPY` options.
    #[must_use]
    pub fn from_options(options: &CopyOptions) -> Self {
        Self {
            chunk_size: options.chunk_size(),
            compression: options.compression(),
        }
    }
}

impl Default for ColumnarOptions {
    fn default() -> Self {
        Self::from_options(&CopyOptions::new())
    }
}

/// Where a reader gets its bytes.
pub enum ReadSource {
    /// File, or directory root of a partitioned dataset.
    Path(PathBuf),
    /// Already open stream such as standard input.
    Stream(Box<dyn Read + Send>),
}

/// Where a writer puts its bytes.
pub enum WriteDestination<'a> {
    /// File, or directory root of a partitioned dataset.
    Path(PathBuf),
    /// Already open stream such as standard output.
    Stream(&'a mut (dyn Write + Send)),
}

/// Column information available when opening a reader.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReaderColumns<'a> {
    /// Explicit column list from the command.
    pub explicit: &'a [String],
    /// Known table columns, used for names when nothing else names the
    /// fields and for types.
    pub table: &'a [ColumnSpec],
}

/// Opens a reader for the given format.
///
/// A columnar source that is a directory is read as a partitioned dataset.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] for streams with a columnar format and
/// [`Error::OperationFailed`] when the source cannot be opened.
pub fn open_reader(
    format: Format,
    source: ReadSource,
    options: &CopyOptions,
    columns: ReaderColumns<'_>,
) -> Result<Box<dyn RowReader>> {
    match (format, source) {
        (Format::Columnar, ReadSource::Stream(_)) => Err(Error::InvalidInput(
            "STDIN is not supported for columnar format; use a file path".to_string(),
        )),
        (Format::Columnar, ReadSource::Path(path)) if path.is_dir() => Ok(Box::new(
            partitioned::PartitionedReader::open(&path, ColumnarOptions::from_options(options), options.partition_filter())?,
        )),
        (Format::Columnar, ReadSource::Path(path)) => Ok(Box::new(parquet::ColumnarReader::open(
            &path,
            ColumnarOptions::from_options(options),
        )?)),
        (Format::Delimited, source) => Ok(Box::new(csv::DelimitedReader::new(
            open_stream(source)?,
            &DelimitedOptions::from_options(options),
            columns.explicit,
            columns.table,
        )?)),
        (Format::Json, source) => Ok(Box::new(json::JsonReader::new(
            BufReader::new(open_stream(source)?),
            columns.explicit,
            columns.table,
        )?)),
    }
}

/// Creates a writer for the given format.
///
/// With partition columns set, a columnar destination becomes the root of a
/// partitioned dataset.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] for streams with a columnar format and
/// [`Error::OperationFailed`] when the destination cannot be created.
pub fn create_writer<'a>(
    format: Format,
    destination: WriteDestination<'a>,
    columns: &[ColumnSpec],
    options: &CopyOptions,
) -> Result<Box<dyn RowWriter + 'a>> {
    let partition_columns = options.partition_columns();
    match (format, destination) {
        (Format::Columnar, WriteDestination::Stream(_)) => Err(Error::InvalidInput(
            "STDOUT is not supported for columnar format; use a file path".to_string(),
        )),
        (Format::Columnar, WriteDestination::Path(root)) if !partition_columns.is_empty() => {
            Ok(Box::new(partitioned::PartitionedWriter::create(
                root,
                columns,
                partitioned::PartitionOptions::from_options(options),
            )?))
        },
        (Format::Columnar, WriteDestination::Path(path)) => Ok(Box::new(
            parquet::ColumnarWriter::new(create_file(&path)?, columns, ColumnarOptions::from_options(options))?,
        )),
        (Format::Delimited, WriteDestination::Path(path)) => Ok(Box::new(csv::DelimitedWriter::new(
            create_file(&path)?,
            columns,
            &DelimitedOptions::from_options(options),
        )?)),
        (Format::Delimited, WriteDestination::Stream(out)) => Ok(Box::new(
            csv::DelimitedWriter::new(out, columns, &DelimitedOptions::from_options(options))?,
        )),
        (Format::Json, WriteDestination::Path(path)) => {
            Ok(Box::new(json::JsonWriter::new(create_file(&path)?, columns)))
        },
        (Format::Json, WriteDestination::Stream(out)) => {
            Ok(Box::new(json::JsonWriter::new(out, columns)))
        },
    }
}

fn open_stream(source: ReadSource) -> Result<Box<dyn Read + Send>> {
    match source {
        ReadSource::Stream(stream) => Ok(stream),
        ReadSource::Path(path) => {
            let file = File::open(&path).map_err(|e| Error::OperationFailed {
                operation: "open_import_file".to_string(),
                cause: format!("{}: {e}", path.display()),
            })?;
            Ok(Box::new(file))
        },
    }
}

/// Creates (or truncates) a file for writing.
pub(crate) fn create_file(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).map_err(|e| Error::OperationFailed {
        operation: "create_export_file".to_string(),
        cause: format!("{}: {e}", path.display()),
    })?;
    Ok(BufWriter::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_str() {
        assert_eq!(Format::from_str("csv").unwrap(), Format::Delimited);
        assert_eq!(Format::from_str("COLUMNAR").unwrap(), Format::Columnar);
        assert_eq!(Format::from_str("parquet").unwrap(), Format::Columnar);
        assert_eq!(Format::from_str("ndjson").unwrap(), Format::Json);
        assert!(Format::from_str("unknown").is_err());
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(Format::from_path(Path::new("t.csv")), Some(Format::Delimited));
        assert_eq!(Format::from_path(Path::new("t.PARQUET")), Some(Format::Columnar));
        assert_eq!(Format::from_path(Path::new("t.json")), Some(Format::Json));
        assert_eq!(Format::from_path(Path::new("dataset")), None);
    }

    #[test]
    fn test_stdin_columnar_reader_rejected() {
        let result = open_reader(
            Format::Columnar,
            ReadSource::Stream(Box::new(std::io::empty())),
            &CopyOptions::new(),
            ReaderColumns::default(),
        );
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
