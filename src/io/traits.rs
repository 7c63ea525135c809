//! Core traits for import/export operations.
//!
//! Defines the [`RowReader`] and [`RowWriter`] traits that format adapters
//! implement to support different file formats.

use crate::Result;
use crate::models::{ColumnSpec, RowRecord};

/// A source record that could not be turned into a row.
///
/// Parse failures travel in-band with good rows so a malformed record never
/// stops the stream; the import pipeline counts them against its budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFailure {
    /// 1-based record index in the source, counting skipped records.
    pub record: u64,
    /// What was wrong with the record.
    pub message: String,
}

impl ParseFailure {
    /// Creates a parse failure.
    #[must_use]
    pub fn new(record: u64, message: impl Into<String>) -> Self {
        Self {
            record,
            message: message.into(),
        }
    }
}

impl From<ParseFailure> for crate::Error {
    fn from(failure: ParseFailure) -> Self {
        Self::Parse {
            record: failure.record,
            message: failure.message,
        }
    }
}

/// One read result: a record or its parse failure.
pub type RecordResult = std::result::Result<RowRecord, ParseFailure>;

/// Records returned by one [`RowReader::read_batch`] call.
#[derive(Debug, Default)]
pub struct ReadBatch {
    /// Records in source order.
    pub records: Vec<RecordResult>,
    /// Whether the source is exhausted.
    ///
    /// Distinct from an I/O failure, which is returned as an error instead.
    pub end_of_data: bool,
}

/// Shape of a multi-file source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetInfo {
    /// Data files selected for reading.
    pub files: usize,
    /// Distinct partition directories among them.
    pub partitions: usize,
}

/// Source of rows.
///
/// # Lifecycle
///
/// 1. Open the reader (format specific constructor)
/// 2. Inspect [`RowReader::schema`]
/// 3. Optionally [`RowReader::skip`] leading records
/// 4. Call [`RowReader::read_batch`] until `end_of_data`
/// 5. Call [`RowReader::close`]
pub trait RowReader: Send {
    /// Column names and, where the source knows them, their types.
    fn schema(&self) -> &[ColumnSpec];

    /// Reads up to `max` records.
    ///
    /// Never returns more than `max` records, and never reads further into
    /// the source than needed to produce them.
    ///
    /// # Errors
    ///
    /// Returns an error only for I/O failures; malformed records are
    /// reported in-band as [`ParseFailure`]s.
    fn read_batch(&mut self, max: usize) -> Result<ReadBatch>;

    /// Discards up to `n` raw records without parsing them.
    ///
    /// Returns how many records were discarded, which is less than `n` only
    /// when the source ran out.
    ///
    /// # Errors
    ///
    /// Returns an error if I/O fails.
    fn skip(&mut self, n: u64) -> Result<u64>;

    /// File and partition counts when the source is a partitioned dataset.
    fn dataset(&self) -> Option<DatasetInfo> {
        None
    }

    /// Releases the source.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be released cleanly.
    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

/// Rows and files written for one partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionReport {
    /// Partition path, `col=value/...`.
    pub key: String,
    /// Rows written under the partition.
    pub rows: u64,
    /// Files created under the partition.
    pub files: usize,
}

/// What a writer produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteReport {
    /// Rows written across all files.
    pub rows_written: u64,
    /// Files created.
    pub files_written: usize,
    /// Per-partition counts, sorted by key. Empty for unpartitioned writers.
    pub partitions: Vec<PartitionReport>,
    /// Open handles closed early to stay under the open file ceiling.
    pub handles_evicted: u64,
}

/// Sink for rows.
///
/// # Lifecycle
///
/// 1. Create the writer with its destination and columns
/// 2. Call [`RowWriter::write_row`] or [`RowWriter::write_rows`]
/// 3. Optionally [`RowWriter::flush`]
/// 4. Call [`RowWriter::close`] to finish files and obtain the report
pub trait RowWriter {
    /// Writes one row.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or I/O fails.
    fn write_row(&mut self, row: &RowRecord) -> Result<()>;

    /// Writes several rows in order.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered.
    fn write_rows(&mut self, rows: &[RowRecord]) -> Result<()> {
        rows.iter().try_for_each(|row| self.write_row(row))
    }

    /// Pushes buffered rows to the underlying files without closing them.
    ///
    /// # Errors
    ///
    /// Returns an error if I/O fails.
    fn flush(&mut self) -> Result<()>;

    /// Finishes all files.
    ///
    /// This method consumes the writer.
    ///
    /// # Errors
    ///
    /// Returns an error if I/O fails.
    fn close(self: Box<Self>) -> Result<WriteReport>;
}
